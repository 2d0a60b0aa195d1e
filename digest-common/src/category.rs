use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The four fixed editorial categories (spec §3, §9). A closed set — never a free
/// string. Category-specific behavior (keywords, display name, LLM guidance) is
/// looked up by key in [`CategoryInfo::for_category`], never duplicated ad hoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Category {
    #[serde(rename = "AI_and_Strategy")]
    AiAndStrategy,
    #[serde(rename = "Ecommerce_Retail_Tech")]
    EcommerceRetailTech,
    #[serde(rename = "Luxury_and_Consumer")]
    LuxuryAndConsumer,
    #[serde(rename = "Jewellery_Industry")]
    JewelleryIndustry,
}

impl Category {
    /// All four categories, in the fixed specificity order used for rule-classifier
    /// tie-breaking (spec §4.3): Jewellery > Luxury > Ecommerce > AI.
    pub const fn specificity_order() -> [Category; 4] {
        [
            Category::JewelleryIndustry,
            Category::LuxuryAndConsumer,
            Category::EcommerceRetailTech,
            Category::AiAndStrategy,
        ]
    }

    /// All four categories, in canonical enumeration order (used for iteration
    /// that should always cover every category regardless of tie-break order).
    pub const fn all() -> [Category; 4] {
        [
            Category::AiAndStrategy,
            Category::EcommerceRetailTech,
            Category::LuxuryAndConsumer,
            Category::JewelleryIndustry,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::AiAndStrategy => "AI_and_Strategy",
            Category::EcommerceRetailTech => "Ecommerce_Retail_Tech",
            Category::LuxuryAndConsumer => "Luxury_and_Consumer",
            Category::JewelleryIndustry => "Jewellery_Industry",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::AiAndStrategy => "AI & Strategy",
            Category::EcommerceRetailTech => "Ecommerce & Retail Tech",
            Category::LuxuryAndConsumer => "Luxury & Consumer",
            Category::JewelleryIndustry => "Jewellery Industry",
        }
    }

    /// Where this category sits in the tie-break specificity order: 0 = most
    /// specific (wins ties), 3 = least specific.
    pub fn specificity_rank(&self) -> u8 {
        Self::specificity_order()
            .iter()
            .position(|c| c == self)
            .expect("every category appears in specificity_order") as u8
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AI_and_Strategy" => Ok(Category::AiAndStrategy),
            "Ecommerce_Retail_Tech" => Ok(Category::EcommerceRetailTech),
            "Luxury_and_Consumer" => Ok(Category::LuxuryAndConsumer),
            "Jewellery_Industry" => Ok(Category::JewelleryIndustry),
            other => Err(format!("unknown category: {other}")),
        }
    }
}
