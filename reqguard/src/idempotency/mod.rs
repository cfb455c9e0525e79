//! 冪等キーストア
//!
//! クライアントが指定した冪等キー（HTTPメソッド+ルート単位）ごとに
//! 副作用を高々1回だけ実行し、再送時には最初のレスポンスを再生する。

/// 冪等レコードの型定義
pub mod types;

/// キー検証・ハッシュ計算
pub mod key;

/// 予約→実行→確定プロトコル
pub mod guard;
