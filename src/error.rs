/// Everything that can go wrong inside one run of the pipeline.
///
/// Only `Decode` aborts a run. The remaining variants come out of the
/// guarded inference region and are degraded to "no detections".
#[derive(Debug, Fail)]
pub enum PipelineError {
    #[fail(display = "Failed to decode image: {}", _0)]
    Decode(#[cause] image::ImageError),
    #[fail(display = "Error contacting ALPR server: {}", _0)]
    Transport(#[cause] reqwest::Error),
    #[fail(display = "ALPR server error: {}", _0)]
    Remote(String),
    #[fail(display = "Malformed ALPR response: {}", _0)]
    Malformed(#[cause] serde_json::Error),
    #[fail(display = "Malformed detection: {}", _0)]
    Normalization(String),
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        PipelineError::Transport(e)
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Malformed(e)
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(e: image::ImageError) -> Self {
        PipelineError::Decode(e)
    }
}
