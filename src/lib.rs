pub mod alert;
pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod notify;
pub mod reading;
pub mod status;
pub mod store;
pub mod ws;

// Re-export commonly used items
pub use alert::{AlertController, AlertPolicy, AlertSnapshot};
pub use api::{create_router, AppState};
pub use config::Config;
pub use error::{AppError, DeliveryError, Result};
pub use ingest::{IngestPipeline, Subscription, SENSOR_EVENT};
pub use notify::{DisabledNotifier, Notifier, SmsNotifier};
pub use reading::{Reading, ValidationError};
pub use status::{derive_status, DayOrNight, Status, TempLevel};
pub use store::ReadingStore;
