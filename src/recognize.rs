//! Visual recognition pipeline: one image, one domain, one best match.
//!
//! extract → match. The image is embedded by the domain's frozen encoder
//! and ranked against the domain's feature store; the top record (or the
//! domain sentinel for an empty store) comes back as the result.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::app::AppContext;
use crate::error::{CoreError, CoreResult};
use crate::matcher::best_match;
use crate::models::{Domain, RecognizeRequest, RecognizeResponse};

/// Run the recognition pipeline. Inference is dispatched to the blocking
/// pool; the handling task only waits.
pub async fn recognize(
    ctx: &Arc<AppContext>,
    request: RecognizeRequest,
) -> CoreResult<RecognizeResponse> {
    request.validate()?;

    let ctx = ctx.clone();
    let result = tokio::task::spawn_blocking(move || {
        let (encoder, store) = match request.domain {
            Domain::Place => (&ctx.place_encoder, &ctx.place_store),
            Domain::Person => (&ctx.person_encoder, &ctx.person_store),
        };
        let vector = encoder.extract(&request.image)?;
        Ok::<_, CoreError>(best_match(&vector, store, request.domain.sentinel()))
    })
    .await
    .map_err(|e| CoreError::Encoder(format!("inference task failed: {}", e)))??;

    Ok(RecognizeResponse {
        label: result.label,
        score: result.score,
        source_id: result.source_id,
    })
}

/// CLI entry point: read the image, recognize, print the match.
pub async fn run_recognize(ctx: &Arc<AppContext>, domain: &str, image: &Path) -> Result<()> {
    let domain = Domain::parse(domain)?;
    let bytes = std::fs::read(image)?;

    let response = recognize(
        ctx,
        RecognizeRequest {
            domain,
            image: bytes,
        },
    )
    .await?;

    println!("{}  [{:.3}]", response.label, response.score);
    if let Some(source_id) = &response.source_id {
        println!("    reference: {}", source_id);
    }
    Ok(())
}
