pub mod article;
pub mod cache;
pub mod category;
pub mod classification;
pub mod config;
pub mod digest;
pub mod error;
pub mod fingerprint;
pub mod gate;
pub mod selection;
pub mod url;

pub use article::{Article, SourceType, WeekWindow};
pub use cache::{CacheRow, FingerprintCache};
pub use category::Category;
pub use classification::Classification;
pub use config::Config;
pub use digest::{CategoryTopics, Digest};
pub use error::DigestError;
pub use fingerprint::fingerprint;
pub use gate::{Gate, Tier};
pub use selection::{RerankStats, SelectedArticle, Selection};
pub use url::{extract_host, normalize_title, normalize_url};
