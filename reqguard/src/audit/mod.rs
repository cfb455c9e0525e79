//! 監査証跡
//!
//! 機密操作・状態変更を追記専用のハッシュチェーンに記録し、
//! ユーザー単位のエクスポートと保持期間後のIPアドレス匿名化を提供する

/// 監査ログの型定義
pub mod types;

/// SHA-256エントリハッシュチェーン（改ざん検知）
pub mod hash_chain;

/// CSV / JSONエクスポート
pub mod export;

/// IPアドレス匿名化の保持期間
pub mod anonymize;

/// 追記・エクスポート・匿名化・検証
pub mod trail;

/// 非同期ライター（fail-open）
pub mod writer;
