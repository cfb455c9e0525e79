//! 共通型定義
//!
//! エラー型・時計・IPアドレスユーティリティ

/// エラー型
pub mod error;

/// 時刻ソース
pub mod clock;

/// IPアドレス正規化・匿名化
pub mod ip;
