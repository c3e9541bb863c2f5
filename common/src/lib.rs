//! Mockup Common Library
//!
//! ラベリング・スクレイピング・ロゴ加工・モックアップ作成で共有される型と規則

pub mod analysis;
pub mod error;
pub mod job;
pub mod labels;
pub mod scrape;
pub mod session;
pub mod validation;

pub use analysis::{LogoAnalysis, LogoType, RecommendedPath};
pub use error::{Error, Result};
pub use job::{JobManifest, JobOptions, PrintMethod, SizeLock, TargetSize};
pub use labels::{BoundingBox, ImageLabels, LabelMap, DEFAULT_BOX_NAME};
pub use scrape::{company_name_from_url, normalize_url, ScrapeOutcome};
pub use session::SessionState;
pub use validation::{validate, ValidationReport};
