pub mod client;
pub mod types;

pub use client::{HttpRecognitionClient, RecognitionClient};
pub use types::{
    parse_response, RecognitionError, RecognitionResult, RecognizedFace, SubmitOutcome,
    UNKNOWN_NAME,
};
