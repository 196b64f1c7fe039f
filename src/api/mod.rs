mod middleware;
mod routes;

pub use middleware::log_request_errors;
pub use routes::{
    ExtractFramesResponse, FrameData, FrameExtractRequest, MergeRequest, StitchRequest,
    extract_frames, health, merge, stitch,
};
