//! The serving contract: load once, then decode, predict and encode per
//! request against the shared model.

use crate::{Result, ServingConfig};
use fluxgate_candle::{CandleBackend, ModelLoader};
use fluxgate_core::{codec, AcceptType, ContentType, Model, ModelError, Payload, Predictions};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;

pub type SharedModel = Arc<dyn Model>;

type LoadFn = dyn Fn() -> std::result::Result<SharedModel, ModelError> + Send + Sync;

pub struct ServingRuntime {
    config: ServingConfig,
    loader: Arc<LoadFn>,
    model: OnceCell<SharedModel>,
}

impl ServingRuntime {
    /// Runtime that loads a candle model from `config.model_dir` on first use.
    pub fn new(config: ServingConfig) -> Self {
        let model_dir = config.model_dir.clone();
        let use_gpu = config.use_gpu;
        Self::with_loader(config, move || {
            let backend = if use_gpu {
                CandleBackend::new().map_err(|e| ModelError::Load(e.to_string()))?
            } else {
                CandleBackend::cpu()
            };
            let model = ModelLoader::new(&model_dir).with_backend(backend).load()?;
            Ok(Arc::new(model) as SharedModel)
        })
    }

    pub fn with_loader<F>(config: ServingConfig, loader: F) -> Self
    where
        F: Fn() -> std::result::Result<SharedModel, ModelError> + Send + Sync + 'static,
    {
        Self {
            config,
            loader: Arc::new(loader),
            model: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &ServingConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Returns the process-wide model, loading it on the first call.
    /// Concurrent first callers wait on a single load; a failed load is not
    /// cached, so the next call tries again. The load itself runs on the
    /// blocking pool.
    pub async fn load(&self) -> Result<SharedModel> {
        let model = self
            .model
            .get_or_try_init(|| async {
                let start = Instant::now();
                let loader = self.loader.clone();
                let model = tokio::task::spawn_blocking(move || loader())
                    .await
                    .map_err(|e| ModelError::Load(format!("load task failed: {}", e)))??;
                tracing::info!(
                    model = model.name(),
                    input_dim = model.input_dim(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Model loaded"
                );
                Ok::<_, ModelError>(model)
            })
            .await?;
        Ok(model.clone())
    }

    pub fn decode(&self, body: &[u8], content_type: &str) -> Result<Payload> {
        let content_type = ContentType::parse(content_type)?;
        Ok(codec::decode(body, content_type)?)
    }

    pub fn predict(&self, payload: Payload, model: &dyn Model) -> Result<Predictions> {
        Ok(model.predict(payload)?)
    }

    pub fn encode(
        &self,
        predictions: &Predictions,
        accept: Option<&str>,
    ) -> Result<(Vec<u8>, &'static str)> {
        Ok(codec::encode_predictions(predictions, AcceptType::parse(accept))?)
    }

    /// Runs all four stages for one request body.
    pub async fn invoke(
        &self,
        body: &[u8],
        content_type: &str,
        accept: Option<&str>,
    ) -> Result<(Vec<u8>, &'static str)> {
        let start = Instant::now();
        let payload = self.decode(body, content_type)?;
        let rows = payload.row_count();
        let model = self.load().await?;
        let forward_model = model.clone();
        let predictions = tokio::task::spawn_blocking(move || forward_model.predict(payload))
            .await
            .map_err(|e| ModelError::Backend(format!("forward task failed: {}", e)))??;
        let encoded = self.encode(&predictions, accept)?;

        tracing::info!(
            model = model.name(),
            content_type,
            rows,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Invocation served"
        );
        Ok(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use fluxgate_core::{CodecError, FeatureVector};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MeanModel;

    impl Model for MeanModel {
        fn name(&self) -> &str {
            "mean"
        }

        fn input_dim(&self) -> usize {
            2
        }

        fn forward(&self, rows: &[FeatureVector]) -> std::result::Result<Predictions, ModelError> {
            Ok(Predictions::new(
                rows.iter()
                    .map(|r| vec![r.values().iter().sum::<f64>() / 2.0])
                    .collect(),
            ))
        }
    }

    fn runtime_with_counter() -> (Arc<ServingRuntime>, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let runtime = ServingRuntime::with_loader(ServingConfig::default(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(Arc::new(MeanModel) as SharedModel)
        });
        (Arc::new(runtime), loads)
    }

    #[tokio::test]
    async fn test_model_loads_once_under_concurrency() {
        let (runtime, loads) = runtime_with_counter();
        assert!(!runtime.is_loaded());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let runtime = runtime.clone();
                tokio::spawn(async move { runtime.load().await.map(|m| m.name().to_string()) })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "mean");
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(runtime.is_loaded());
    }

    #[tokio::test]
    async fn test_slow_load_does_not_block_runtime() {
        let runtime = Arc::new(ServingRuntime::with_loader(ServingConfig::default(), || {
            std::thread::sleep(std::time::Duration::from_millis(300));
            Ok(Arc::new(MeanModel) as SharedModel)
        }));

        let loading = tokio::spawn({
            let runtime = runtime.clone();
            async move { runtime.load().await.map(|_| ()) }
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!runtime.is_loaded());

        loading.await.unwrap().unwrap();
        assert!(runtime.is_loaded());
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let runtime = ServingRuntime::with_loader(ServingConfig::default(), move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ModelError::Load("not yet".into()))
            } else {
                Ok(Arc::new(MeanModel) as SharedModel)
            }
        });

        assert!(runtime.load().await.is_err());
        assert!(runtime.load().await.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invoke_csv_to_json() {
        let (runtime, _) = runtime_with_counter();
        let (body, content_type) = runtime
            .invoke(b"1,3", "text/csv", Some("application/json"))
            .await
            .unwrap();
        assert_eq!(body, b"[2.0]");
        assert_eq!(content_type, "application/json");
    }

    #[tokio::test]
    async fn test_invoke_json_batch_to_csv() {
        let (runtime, _) = runtime_with_counter();
        let (body, content_type) = runtime
            .invoke(
                br#"{"instances": [[1, 3], [2, 2], [0, 1]]}"#,
                "application/json",
                Some("text/csv"),
            )
            .await
            .unwrap();
        assert_eq!(String::from_utf8(body).unwrap(), "2\n2\n0.5");
        assert_eq!(content_type, "text/csv");
    }

    #[tokio::test]
    async fn test_invoke_unsupported_media_type_skips_load() {
        let (runtime, loads) = runtime_with_counter();
        let err = runtime
            .invoke(b"<x/>", "application/xml", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Codec(CodecError::UnsupportedMediaType(_))));
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invoke_shape_error() {
        let (runtime, _) = runtime_with_counter();
        let err = runtime.invoke(b"1,2,3", "text/csv", None).await.unwrap_err();
        assert!(matches!(err, Error::Model(ModelError::Shape { expected: 2, got: 3 })));
    }
}
