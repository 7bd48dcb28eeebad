//! Application context: every model, store, and client the pipelines
//! need, loaded once at startup and shared read-only.
//!
//! Construction is the only place artifacts are touched. Anything
//! missing or inconsistent — an absent snapshot, a checksum mismatch, an
//! encoder whose dims disagree with its paired store — fails here, so a
//! process that finishes loading can serve every pipeline. There is no
//! hidden init order: pipelines receive the context by reference.

use sha2::{Digest, Sha256};
use std::path::Path;

use crate::classifier::SymbolClassifier;
use crate::config::Config;
use crate::encoder::ImageEncoder;
use crate::error::{CoreError, CoreResult};
use crate::generate::GenerationClient;
use crate::index::PlaceIndex;
use crate::store::FeatureStore;

/// Process-wide arena of loaded artifacts and external clients.
pub struct AppContext {
    pub config: Config,
    pub place_encoder: ImageEncoder,
    pub person_encoder: ImageEncoder,
    pub place_store: FeatureStore,
    pub person_store: FeatureStore,
    pub classifier: SymbolClassifier,
    pub index: PlaceIndex,
    pub generator: GenerationClient,
}

impl AppContext {
    pub async fn load(config: Config) -> CoreResult<Self> {
        verify_checksum(
            &config.encoders.place.model_path,
            config.encoders.place.sha256.as_deref(),
        )?;
        verify_checksum(
            &config.encoders.person.model_path,
            config.encoders.person.sha256.as_deref(),
        )?;
        verify_checksum(
            &config.classifier.model_path,
            config.classifier.sha256.as_deref(),
        )?;

        let place_encoder = ImageEncoder::load(&config.encoders.place)?;
        let person_encoder = ImageEncoder::load(&config.encoders.person)?;

        let place_store = FeatureStore::load(&config.stores.place_snapshot)?;
        let person_store = FeatureStore::load(&config.stores.person_snapshot)?;
        check_pairing("place", &place_encoder, &place_store)?;
        check_pairing("person", &person_encoder, &person_store)?;

        let classifier = SymbolClassifier::load(&config.classifier)?;
        let index = PlaceIndex::open(&config.index).await?;
        let generator = GenerationClient::new(&config.generation)?;

        Ok(Self {
            config,
            place_encoder,
            person_encoder,
            place_store,
            person_store,
            classifier,
            index,
            generator,
        })
    }
}

/// Query and stored vectors must live in the same feature space; a
/// snapshot built for a different encoder is unusable, not just
/// lower-quality.
fn check_pairing(domain: &str, encoder: &ImageEncoder, store: &FeatureStore) -> CoreResult<()> {
    if !store.is_empty() && store.dims() != encoder.dims() {
        return Err(CoreError::Artifact(format!(
            "{} snapshot holds {}-dim vectors but the encoder produces {}",
            domain,
            store.dims(),
            encoder.dims()
        )));
    }
    Ok(())
}

/// Compare a file's SHA-256 digest against the checksum pinned in
/// config, when one is pinned.
pub(crate) fn verify_checksum(path: &Path, expected: Option<&str>) -> CoreResult<()> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let bytes = std::fs::read(path)
        .map_err(|e| CoreError::Artifact(format!("read {}: {}", path.display(), e)))?;
    let digest = hex::encode(Sha256::digest(&bytes));
    if !digest.eq_ignore_ascii_case(expected.trim()) {
        return Err(CoreError::Artifact(format!(
            "{} checksum mismatch: expected {}, found {}",
            path.display(),
            expected,
            digest
        )));
    }
    Ok(())
}
