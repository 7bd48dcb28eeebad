//! Hieroglyph translation pipeline.
//!
//! classify → assemble → generate. Each cropped symbol image is
//! classified independently into one class; the labels are comma-joined
//! in classification order into the grounding context, and the
//! generative model synthesizes a reading from them.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app::AppContext;
use crate::error::{CoreError, CoreResult};
use crate::models::{TranslateRequest, TranslateResponse};
use crate::prompt::translation_messages;

/// Run the translation pipeline. Classification happens on the blocking
/// pool, one image after another in request order.
pub async fn translate(
    ctx: &Arc<AppContext>,
    request: TranslateRequest,
) -> CoreResult<TranslateResponse> {
    request.validate()?;

    let classes = {
        let ctx = ctx.clone();
        tokio::task::spawn_blocking(move || {
            request
                .images
                .iter()
                .map(|image| ctx.classifier.classify(image))
                .collect::<CoreResult<Vec<String>>>()
        })
        .await
        .map_err(|e| CoreError::Classifier(format!("inference task failed: {}", e)))??
    };

    let messages = translation_messages(&classes);
    let translation = ctx.generator.complete(&messages).await?;

    Ok(TranslateResponse {
        translation,
        classes,
    })
}

/// CLI entry point: read the symbol images, translate, print the classes
/// and the synthesized reading.
pub async fn run_translate(ctx: &Arc<AppContext>, images: &[PathBuf]) -> Result<()> {
    let mut bytes = Vec::with_capacity(images.len());
    for path in images {
        bytes.push(read_image(path)?);
    }

    let response = translate(ctx, TranslateRequest { images: bytes }).await?;

    println!("symbols: {}", response.classes.join(", "));
    println!();
    println!("{}", response.translation);
    Ok(())
}

fn read_image(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| anyhow::anyhow!("read {}: {}", path.display(), e))
}
