//! Per-file download → transcode → upload pipeline.
//!
//! Each file runs in isolation: any stage error marks that file failed and
//! the batch moves on. [`BatchProcessor::process_batch`] itself never fails.

use crate::content_version::ContentVersionApi;
use crate::image::ImageService;
use crate::models::{BatchResult, EncodingOptions, FileDescriptor, NewVersion, UnsupportedFormatPolicy};
use crate::transport::TransportService;
use crate::Result;
use futures_util::stream::{self, StreamExt};
use tracing::{error, info, info_span, warn, Instrument};

#[derive(Debug, Clone, Copy)]
pub struct BatchSettings {
    /// Pipelines in flight at once; 1 means strictly sequential.
    pub max_concurrency: usize,
    pub unsupported_format: UnsupportedFormatPolicy,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            unsupported_format: UnsupportedFormatPolicy::Fail,
        }
    }
}

pub struct BatchProcessor {
    transport: Box<dyn TransportService>,
    transcoder: Box<dyn ImageService>,
    api: ContentVersionApi,
    settings: BatchSettings,
}

impl BatchProcessor {
    pub fn new(
        transport: Box<dyn TransportService>,
        transcoder: Box<dyn ImageService>,
        api: ContentVersionApi,
        settings: BatchSettings,
    ) -> Self {
        Self {
            transport,
            transcoder,
            api,
            settings,
        }
    }

    /// Runs every file through the pipeline and partitions the ids by outcome,
    /// in input order.
    pub async fn process_batch(
        &self,
        files: &[FileDescriptor],
        options: &EncodingOptions,
    ) -> BatchResult {
        let outcomes: Vec<(&FileDescriptor, bool)> = stream::iter(files)
            .map(|file| async move {
                let span = info_span!("file", cv_id = %file.content_version_id);
                let succeeded = async {
                    match self.process_file(file, options).await {
                        Ok(()) => true,
                        Err(e) => {
                            error!("Failed to process file: {}", e.report());
                            false
                        }
                    }
                }
                .instrument(span)
                .await;
                (file, succeeded)
            })
            .buffered(self.settings.max_concurrency.max(1))
            .collect()
            .await;

        let result = outcomes
            .into_iter()
            .fold(BatchResult::new(), |mut result, (file, succeeded)| {
                let id = file.content_version_id.clone();
                if succeeded {
                    result.record_success(id);
                } else {
                    result.record_failure(id);
                }
                result
            });

        info!(
            "Batch complete: {} succeeded, {} failed",
            result.success_cv_ids.len(),
            result.failed_cv_ids.len()
        );
        result
    }

    async fn process_file(&self, file: &FileDescriptor, options: &EncodingOptions) -> Result<()> {
        let original = self
            .transport
            .fetch_binary(&self.api.download(&file.content_version_id)?)
            .await?;
        info!("Downloaded {} bytes", original.len());

        let extension = file.file_extension.as_deref();
        let transcoded = self.transcoder.transcode(&original, extension, options).await;
        let compressed = match transcoded {
            Ok(compressed) => compressed,
            Err(e)
                if e.is_unsupported_format()
                    && self.settings.unsupported_format == UnsupportedFormatPolicy::PassThrough =>
            {
                warn!("{}; uploading original bytes unchanged", e.report());
                original
            }
            Err(e) => return Err(e),
        };
        info!("Transcoded to {} bytes", compressed.len());

        let body = serde_json::to_vec(&NewVersion::compressed(file, &compressed))?;
        let response = self
            .transport
            .submit_and_parse(&self.api.create_version(), body)
            .await?;
        info!("Uploaded new version: {}", response);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::MockTranscoder;
    use crate::models::OrgContext;
    use crate::transport::MockTransport;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn api() -> ContentVersionApi {
        ContentVersionApi::new(OrgContext {
            domain_url: "https://acme.my.salesforce.com".to_string(),
            api_version: "59.0".to_string(),
            access_token: "token".to_string(),
        })
    }

    fn file(id: &str, extension: Option<&str>) -> FileDescriptor {
        FileDescriptor {
            content_version_id: id.to_string(),
            content_document_id: format!("doc-{}", id),
            title: format!("title-{}", id),
            path_on_client: format!("{}.{}", id, extension.unwrap_or("bin")),
            file_extension: extension.map(str::to_string),
        }
    }

    fn processor(
        transport: &MockTransport,
        transcoder: &MockTranscoder,
        settings: BatchSettings,
    ) -> BatchProcessor {
        BatchProcessor::new(
            Box::new(transport.clone()),
            Box::new(transcoder.clone()),
            api(),
            settings,
        )
    }

    fn download_path(id: &str) -> String {
        api().version_data_path(id)
    }

    #[tokio::test]
    async fn test_all_stages_succeed() {
        let transport = MockTransport::new().with_binary(&download_path("C"), b"raw".to_vec());
        let transcoder = MockTranscoder::new();
        let processor = processor(&transport, &transcoder, BatchSettings::default());

        let result = processor
            .process_batch(&[file("C", Some("jpg"))], &EncodingOptions::default())
            .await;

        assert_eq!(result.success_cv_ids, vec!["C".to_string()]);
        assert!(result.failed_cv_ids.is_empty());
        assert_eq!(transcoder.get_calls()[0].input, b"raw".to_vec());

        let uploads = transport.get_uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].path, api().create_version_path());
        assert_eq!(
            uploads[0].body_json().unwrap(),
            serde_json::json!({
                "Title": "title-C",
                "PathOnClient": "C.jpg",
                // base64 of "compressed:raw"
                "VersionData": "Y29tcHJlc3NlZDpyYXc=",
                "ContentDocumentId": "doc-C",
                "IsMajorVersion": true,
                "ReasonForChange": "Compressed file"
            })
        );
    }

    #[tokio::test]
    async fn test_download_failure_skips_upload() {
        let transport = MockTransport::new().with_get_status(&download_path("A"), 500);
        let transcoder = MockTranscoder::new();
        let processor = processor(&transport, &transcoder, BatchSettings::default());

        let result = processor
            .process_batch(&[file("A", Some("png"))], &EncodingOptions::default())
            .await;

        assert_eq!(result.failed_cv_ids, vec!["A".to_string()]);
        assert!(transport.get_uploads().is_empty());
        assert_eq!(transcoder.get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_id_with_path_segments_fails_without_request() {
        let transport = MockTransport::new().with_binary(&download_path("ok1"), b"raw".to_vec());
        let transcoder = MockTranscoder::new();
        let processor = processor(&transport, &transcoder, BatchSettings::default());

        let result = processor
            .process_batch(
                &[file("../User/005A", Some("png")), file("ok1", Some("png"))],
                &EncodingOptions::default(),
            )
            .await;

        assert_eq!(result.failed_cv_ids, vec!["../User/005A".to_string()]);
        assert_eq!(result.success_cv_ids, vec!["ok1".to_string()]);
        let paths: Vec<String> = transport.get_calls().into_iter().map(|c| c.path).collect();
        assert_eq!(paths, vec![download_path("ok1"), api().create_version_path()]);
    }

    #[tokio::test]
    async fn test_failure_is_logged_inside_file_span() {
        let logs = CapturedLogs(Arc::new(Mutex::new(Vec::new())));
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let transport = MockTransport::new().with_get_status(&download_path("A"), 500);
        let transcoder = MockTranscoder::new();
        let processor = processor(&transport, &transcoder, BatchSettings::default());
        processor
            .process_batch(&[file("A", Some("png"))], &EncodingOptions::default())
            .await;

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let line = output
            .lines()
            .find(|line| line.contains("Failed to process file"))
            .unwrap();
        assert!(line.contains("file{cv_id=A}"), "{}", line);
    }

    #[tokio::test]
    async fn test_upload_failure_marks_file_failed() {
        let transport = MockTransport::new()
            .with_binary(&download_path("B"), b"raw".to_vec())
            .with_post_status(&api().create_version_path(), 400);
        let transcoder = MockTranscoder::new();
        let processor = processor(&transport, &transcoder, BatchSettings::default());

        let result = processor
            .process_batch(&[file("B", Some("png"))], &EncodingOptions::default())
            .await;

        assert_eq!(result.failed_cv_ids, vec!["B".to_string()]);
        assert_eq!(transport.get_uploads().len(), 1);
    }

    #[tokio::test]
    async fn test_transcode_failure_marks_file_failed() {
        let transport = MockTransport::new().with_binary(&download_path("T"), b"raw".to_vec());
        let transcoder = MockTranscoder::new().with_failure(true);
        let processor = processor(&transport, &transcoder, BatchSettings::default());

        let result = processor
            .process_batch(&[file("T", Some("jpg"))], &EncodingOptions::default())
            .await;

        assert_eq!(result.failed_cv_ids, vec!["T".to_string()]);
        assert!(transport.get_uploads().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_extension_fails_by_default() {
        let transport = MockTransport::new().with_binary(&download_path("G"), b"gif89a".to_vec());
        let transcoder = MockTranscoder::new();
        let processor = processor(&transport, &transcoder, BatchSettings::default());

        let result = processor
            .process_batch(&[file("G", Some("gif"))], &EncodingOptions::default())
            .await;

        assert_eq!(result.failed_cv_ids, vec!["G".to_string()]);
        assert!(transport.get_uploads().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_extension_passthrough_uploads_original() {
        let transport = MockTransport::new().with_binary(&download_path("G"), b"gif89a".to_vec());
        let transcoder = MockTranscoder::new();
        let settings = BatchSettings {
            unsupported_format: UnsupportedFormatPolicy::PassThrough,
            ..BatchSettings::default()
        };
        let processor = processor(&transport, &transcoder, settings);

        let result = processor
            .process_batch(&[file("G", Some("gif"))], &EncodingOptions::default())
            .await;

        assert_eq!(result.success_cv_ids, vec!["G".to_string()]);
        let body = transport.get_uploads()[0].body_json().unwrap();
        // base64 of "gif89a"
        assert_eq!(body["VersionData"], "Z2lmODlh");
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_calls() {
        let transport = MockTransport::new();
        let transcoder = MockTranscoder::new();
        let processor = processor(&transport, &transcoder, BatchSettings::default());

        let result = processor
            .process_batch(&[], &EncodingOptions::default())
            .await;

        assert_eq!(result, BatchResult::new());
        assert_eq!(transport.get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_sequential_calls_do_not_interleave() {
        let transport = MockTransport::new()
            .with_binary(&download_path("1"), b"one".to_vec())
            .with_binary(&download_path("2"), b"two".to_vec());
        let transcoder = MockTranscoder::new();
        let processor = processor(&transport, &transcoder, BatchSettings::default());

        processor
            .process_batch(
                &[file("1", Some("png")), file("2", Some("png"))],
                &EncodingOptions::default(),
            )
            .await;

        let paths: Vec<String> = transport.get_calls().into_iter().map(|c| c.path).collect();
        let create = api().create_version_path();
        assert_eq!(
            paths,
            vec![download_path("1"), create.clone(), download_path("2"), create]
        );
    }

    #[tokio::test]
    async fn test_partition_covers_every_input_with_concurrency() {
        let mut transport = MockTransport::new();
        let mut files = Vec::new();
        for i in 0..12 {
            let id = format!("068{:02}", i);
            // every third download is missing, every fourth file is a gif
            if i % 3 != 0 {
                transport = transport.with_binary(&download_path(&id), vec![i as u8]);
            }
            let extension = if i % 4 == 0 { "gif" } else { "png" };
            files.push(file(&id, Some(extension)));
        }
        let transcoder = MockTranscoder::new();
        let settings = BatchSettings {
            max_concurrency: 4,
            ..BatchSettings::default()
        };
        let processor = processor(&transport, &transcoder, settings);

        let result = processor
            .process_batch(&files, &EncodingOptions::default())
            .await;

        assert_eq!(result.len(), files.len());
        let success: HashSet<_> = result.success_cv_ids.iter().collect();
        let failed: HashSet<_> = result.failed_cv_ids.iter().collect();
        assert!(success.is_disjoint(&failed));
        let all: HashSet<_> = success.union(&failed).cloned().collect();
        let input: HashSet<_> = files.iter().map(|f| &f.content_version_id).collect();
        assert_eq!(all, input);

        let expected_success: Vec<String> = (0..12)
            .filter(|i| i % 3 != 0 && i % 4 != 0)
            .map(|i| format!("068{:02}", i))
            .collect();
        assert_eq!(result.success_cv_ids, expected_success);
    }
}
