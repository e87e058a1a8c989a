//! # wombo-client
//!
//! Async client for Dream (dream.ai) image generation.
//!
//! This crate provides:
//! - Anonymous credential acquisition by scraping the web bundle
//! - Task submission and deadline-bounded status polling
//! - Concurrent, order-preserving preview frame download and GIF encoding
//! - The style catalog
//! - [`Dream`], which chains the stages, and a blocking adapter
//!
//! Every request goes through the [`Transport`] seam; tests use
//! [`MockTransport`].
//!
//! ```no_run
//! use wombo_client::{Dream, GenerateOptions};
//!
//! # async fn run() -> wombo_core::Result<()> {
//! let dream = Dream::new()?;
//! let generation = dream
//!     .generate("a lighthouse at dusk", &GenerateOptions::default())
//!     .await?;
//! println!("{:?}", generation.task().final_url());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod blocking;
mod dream;
pub mod frames;
mod headers;
pub mod poll;
pub mod retry;
pub mod scrape;
pub mod styles;
pub mod submit;
pub mod transport;

pub use auth::{AnonymousCredentials, CredentialSource, StaticCredential, TOKEN_ENV_VAR};
pub use blocking::BlockingDream;
pub use dream::{Dream, GenerateOptions, Generation};
pub use frames::{Frame, FrameAggregator};
pub use poll::{PollOptions, TaskPoller};
pub use retry::RetryPolicy;
pub use styles::{SiteStyleCatalog, StyleCatalog};
pub use submit::TaskSubmitter;
pub use transport::{HttpRequest, HttpResponse, Method, MockTransport, ReqwestTransport, Transport};

pub use tokio_util::sync::CancellationToken;
