// エラー分類とHTTPステータスの対応

#[cfg(test)]
mod error_mapping_tests {
    use axum::http::StatusCode;
    use reqguard::common::error::GuardError;

    #[test]
    fn test_validation_errors_are_client_errors() {
        let errors = [
            GuardError::InvalidKey,
            GuardError::KeyTooLong { len: 65, max: 64 },
            GuardError::InvalidFormat("xml".to_string()),
            GuardError::MissingUserScope,
        ];
        for err in errors {
            assert!(err.is_validation(), "{:?} should be validation", err);
            assert!(err.status_code().is_client_error());
            assert!(!err.is_storage());
        }
    }

    #[test]
    fn test_key_state_errors_are_conflicts() {
        assert_eq!(
            GuardError::KeyExists("k".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            GuardError::KeyInProgress("k".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            GuardError::KeyConflict {
                key: "k".to_string(),
                reason: "body differs".to_string()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            GuardError::KeyNotFound("k".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_storage_errors_are_server_errors() {
        let err = GuardError::StorageUnavailable("disk I/O error".to_string());
        assert!(err.is_storage());
        assert!(err.status_code().is_server_error());
        // 内部の詳細は外部メッセージに含めない
        assert!(!err.external_message().contains("disk"));
    }
}
