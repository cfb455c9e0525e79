//! 冪等キーの検証とハッシュ計算
//!
//! どちらもI/Oを伴わない純粋関数。

use crate::common::error::{GuardError, GuardResult};
use sha2::{Digest, Sha256};

/// 冪等キーの最大文字数
pub const MAX_KEY_LENGTH: usize = 64;

/// 冪等キーを検証する
///
/// 空なら`InvalidKey`、64文字を超えるなら`KeyTooLong`。
pub fn validate_key(key: &str) -> GuardResult<()> {
    if key.is_empty() {
        return Err(GuardError::InvalidKey);
    }
    let len = key.chars().count();
    if len > MAX_KEY_LENGTH {
        return Err(GuardError::KeyTooLong {
            len,
            max: MAX_KEY_LENGTH,
        });
    }
    Ok(())
}

/// レスポンスボディのSHA-256を16進64文字で返す
pub fn compute_response_hash(body: &[u8]) -> String {
    format!("{:x}", Sha256::digest(body))
}

/// リクエストボディの指紋（同一キーの別リクエスト検出用）
pub fn compute_request_hash(body: &[u8]) -> String {
    compute_response_hash(body)
}
