pub mod element;
pub mod intent;
pub mod keywords;
pub mod plan;
pub mod resolver;
pub mod retry;
pub mod text;

pub use element::{ElementRecord, Locator, Strategy, TextField};
pub use intent::ActionKind;
pub use plan::{AppIdentity, Plan, Step};
pub use retry::{Recovery, RetryLadder, RetryPolicy, SwipeDirection};
