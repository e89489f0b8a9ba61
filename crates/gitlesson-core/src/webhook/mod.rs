//! Push webhook ingestion.

mod payload;
mod pipeline;
mod signature;

pub use self::payload::{PushCommit, PushEvent, PushRepository, PushSender};
pub use self::pipeline::{
    DELIVERY_HEADER, Delivery, DeliveryOutcome, EVENT_HEADER, PushReport, SIGNATURE_HEADER,
    WebhookError, process_delivery,
};
pub use self::signature::{compute_signature, parse_signature_header, verify_signature};
