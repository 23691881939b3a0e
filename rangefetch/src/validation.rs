//! Range download request validation.
//!
//! Validation is pure and runs before any download is created. Apart from a
//! non-blocking request for a missing object, which the manager records as a
//! failed download, a request that fails here never appears in the download
//! queue. Rules are applied in a fixed order and the first violation wins:
//!
//! 1. the object must exist
//! 2. the offset must not be negative
//! 3. the offset must be inside the object
//! 4. the length must be positive
//! 5. the window must end inside the object
//! 6. the sink/mode combination must be file+blocking, file+nonblocking or
//!    stream+blocking
//! 7. a file destination must be absolute and free of `..`

use std::path::{Component, Path};

use crate::error::{DownloadError, DownloadResult};
use crate::object::ObjectMetadata;
use crate::request::{DownloadParams, ExecutionMode, Target, ValidatedRequest};

/// Validate download parameters against the resolved object.
///
/// `object` is `None` when the catalog could not resolve the path.
pub fn validate(
    params: &DownloadParams,
    object: Option<&ObjectMetadata>,
) -> DownloadResult<ValidatedRequest> {
    let object = object.ok_or_else(|| DownloadError::ObjectNotFound {
        path: params.path.clone(),
    })?;

    let (offset, length) = validate_range(params.offset, params.length, object.size)?;
    let target = validate_target(params)?;

    let mode = if params.nonblocking {
        ExecutionMode::NonBlocking
    } else {
        ExecutionMode::Blocking
    };

    Ok(ValidatedRequest {
        object: object.clone(),
        offset,
        length,
        target,
        mode,
    })
}

/// Check `(offset, length)` against the object size.
pub fn validate_range(offset: i64, length: i64, object_size: u64) -> DownloadResult<(u64, u64)> {
    if offset < 0 {
        return Err(DownloadError::invalid_range("offset out of range"));
    }
    let offset = offset as u64;
    if offset >= object_size {
        return Err(DownloadError::invalid_range(format!(
            "offset {} beyond end of object ({} bytes)",
            offset, object_size
        )));
    }

    if length <= 0 {
        return Err(DownloadError::invalid_range("length must be positive"));
    }
    let length = length as u64;
    if length > object_size - offset {
        return Err(DownloadError::invalid_range(format!(
            "length exceeds object size ({} + {} > {})",
            offset, length, object_size
        )));
    }

    Ok((offset, length))
}

fn validate_target(params: &DownloadParams) -> DownloadResult<Target> {
    let destination = params.destination();

    if params.nonblocking && params.stream {
        return Err(DownloadError::invalid_request(
            "async downloads cannot be streamed",
        ));
    }
    if params.nonblocking && destination.is_none() {
        return Err(DownloadError::invalid_request(
            "async downloads require a destination",
        ));
    }

    match (destination, params.stream) {
        (Some(_), true) => Err(DownloadError::invalid_request(
            "destination and stream are mutually exclusive",
        )),
        (None, false) => Err(DownloadError::invalid_request(
            "either a destination or stream must be requested",
        )),
        (None, true) => Ok(Target::Stream),
        (Some(path), false) => {
            validate_destination(path)?;
            Ok(Target::File(path.clone()))
        }
    }
}

/// A file destination must be absolute and must not traverse upwards.
pub fn validate_destination(path: &Path) -> DownloadResult<()> {
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(DownloadError::invalid_destination(
            path,
            "destination must not contain '..'",
        ));
    }
    if !path.is_absolute() {
        return Err(DownloadError::invalid_destination(
            path,
            "destination must be an absolute path",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SIZE: u64 = 1000;

    fn object() -> ObjectMetadata {
        ObjectMetadata::new("videos/a.mp4", SIZE, 64)
    }

    fn file_params(offset: i64, length: i64) -> DownloadParams {
        DownloadParams::to_file("videos/a.mp4", offset, length, "/tmp/out.bin")
    }

    fn reason(err: DownloadError) -> String {
        match err {
            DownloadError::InvalidRange { reason } | DownloadError::InvalidRequest { reason } => {
                reason
            }
            DownloadError::InvalidDestination { reason, .. } => reason,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_valid_file_request() {
        let req = validate(&file_params(10, 100), Some(&object())).unwrap();
        assert_eq!(req.offset, 10);
        assert_eq!(req.length, 100);
        assert_eq!(req.target, Target::File(PathBuf::from("/tmp/out.bin")));
        assert_eq!(req.mode, ExecutionMode::Blocking);
        assert_eq!(req.path(), "videos/a.mp4");
    }

    #[test]
    fn test_valid_stream_and_async() {
        let req = validate(&DownloadParams::to_stream("a", 0, 1), Some(&object())).unwrap();
        assert_eq!(req.target, Target::Stream);

        let req = validate(&file_params(0, SIZE as i64).nonblocking(), Some(&object())).unwrap();
        assert_eq!(req.mode, ExecutionMode::NonBlocking);
    }

    #[test]
    fn test_missing_object() {
        let err = validate(&file_params(0, 1), None).unwrap_err();
        assert!(matches!(err, DownloadError::ObjectNotFound { .. }));
    }

    #[test]
    fn test_missing_object_wins_over_bad_range() {
        let err = validate(&file_params(-10, 0), None).unwrap_err();
        assert!(matches!(err, DownloadError::ObjectNotFound { .. }));
    }

    #[test]
    fn test_negative_offset() {
        let err = validate(&file_params(-10, 5), Some(&object())).unwrap_err();
        assert_eq!(reason(err), "offset out of range");
    }

    #[test]
    fn test_offset_at_end() {
        let err = validate(&file_params(SIZE as i64, 1), Some(&object())).unwrap_err();
        assert!(matches!(err, DownloadError::InvalidRange { .. }));
    }

    #[test]
    fn test_offset_at_end_of_empty_object() {
        let empty = ObjectMetadata::new("empty", 0, 64);
        let err = validate(&file_params(0, 1), Some(&empty)).unwrap_err();
        assert!(matches!(err, DownloadError::InvalidRange { .. }));
    }

    #[test]
    fn test_non_positive_length() {
        for length in [0, -1] {
            let err = validate(&file_params(0, length), Some(&object())).unwrap_err();
            assert_eq!(reason(err), "length must be positive");
        }
    }

    #[test]
    fn test_length_past_end() {
        let err = validate(&file_params(0, SIZE as i64 + 1), Some(&object())).unwrap_err();
        assert!(reason(err).starts_with("length exceeds object size"));

        let err = validate(&file_params(999, 2), Some(&object())).unwrap_err();
        assert!(matches!(err, DownloadError::InvalidRange { .. }));

        assert!(validate(&file_params(999, 1), Some(&object())).is_ok());
    }

    #[test]
    fn test_huge_length_does_not_overflow() {
        let err = validate(&file_params(1, i64::MAX), Some(&object())).unwrap_err();
        assert!(matches!(err, DownloadError::InvalidRange { .. }));
    }

    #[test]
    fn test_async_with_stream() {
        let params = DownloadParams::to_stream("a", 0, 1).nonblocking();
        let err = validate(&params, Some(&object())).unwrap_err();
        assert_eq!(reason(err), "async downloads cannot be streamed");
    }

    #[test]
    fn test_async_without_destination() {
        let mut params = file_params(0, 1).nonblocking();
        params.destination = None;
        let err = validate(&params, Some(&object())).unwrap_err();
        assert_eq!(reason(err), "async downloads require a destination");
    }

    #[test]
    fn test_stream_with_destination() {
        let mut params = file_params(0, 1);
        params.stream = true;
        let err = validate(&params, Some(&object())).unwrap_err();
        assert_eq!(reason(err), "destination and stream are mutually exclusive");
    }

    #[test]
    fn test_neither_destination_nor_stream() {
        let mut params = file_params(0, 1);
        params.destination = None;
        let err = validate(&params, Some(&object())).unwrap_err();
        assert!(matches!(err, DownloadError::InvalidRequest { .. }));
    }

    #[test]
    fn test_relative_destination() {
        let params = DownloadParams::to_file("a", 0, 1, "out/file.bin");
        let err = validate(&params, Some(&object())).unwrap_err();
        assert_eq!(reason(err), "destination must be an absolute path");
    }

    #[test]
    fn test_parent_relative_destination() {
        for dest in ["../file.bin", "/tmp/../etc/passwd"] {
            let params = DownloadParams::to_file("a", 0, 1, dest);
            let err = validate(&params, Some(&object())).unwrap_err();
            assert!(matches!(err, DownloadError::InvalidDestination { .. }));
        }
    }

    #[test]
    fn test_range_checked_before_sink() {
        let params = DownloadParams::to_stream("a", -1, 1).nonblocking();
        let err = validate(&params, Some(&object())).unwrap_err();
        assert!(matches!(err, DownloadError::InvalidRange { .. }));
    }
}
