use crate::entity::ObservableEntity;
use crate::pipeline::DetectionPipeline;
use bytes::{Buf, Bytes, BytesMut};
use failure::Error;
use futures::StreamExt;
use log::{debug, error, warn};
use std::sync::Arc;
use warp::Filter;

const MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug)]
struct HandleImageError;

impl warp::reject::Reject for HandleImageError {}

pub fn routes(
    pipeline: Arc<DetectionPipeline>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let with_pipeline = warp::any().map(move || pipeline.clone());
    let process = warp::post()
        .and(warp::path!("process"))
        .and(warp::multipart::form().max_length(MAX_UPLOAD_BYTES))
        .and(with_pipeline.clone())
        .and_then(|form, pipeline| async {
            let result = handle_image(form, pipeline).await;
            if let Err(e) = &result {
                error!("Error handling image: {}", e);
            }
            result.map_err(|_| warp::reject::custom(HandleImageError))
        });
    let state = warp::get()
        .and(warp::path!("state"))
        .and(with_pipeline)
        .map(|pipeline: Arc<DetectionPipeline>| warp::reply::json(&pipeline.snapshot()));
    process.or(state)
}

pub async fn run(pipeline: Arc<DetectionPipeline>, port: u16) {
    warp::serve(routes(pipeline)).run(([0, 0, 0, 0], port)).await;
}

async fn handle_image(
    mut form: warp::multipart::FormData,
    pipeline: Arc<DetectionPipeline>,
) -> Result<impl warp::Reply, Error> {
    let mut image: Option<Bytes> = None;

    while let Some(part) = form.next().await {
        let part = part?;
        debug!("Got part {}", part.name());
        match part.name() {
            "upload" => {
                let mut data = BytesMut::new();
                let mut stream = part.stream();
                while let Some(buf) = stream.next().await {
                    let buf = buf?;
                    data.extend_from_slice(buf.chunk());
                }
                image = Some(data.freeze());
            }
            _ => {
                warn!("Ignoring part {}", part.name());
            }
        }
    }

    let image = image.ok_or_else(|| format_err!("Missing upload part"))?;
    pipeline.process(image).await;
    Ok(warp::reply::json(&pipeline.snapshot()))
}
