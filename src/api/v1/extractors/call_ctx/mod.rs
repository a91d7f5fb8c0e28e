/*!
 * Call context extractor
 *
 * Responsibility:
 * - 認証 middleware が作った呼び出し単位のコンテキスト (CallContext) を handler に提供する
 * - HTTP / axum 依存は core に閉じ込め、型定義は types に分離する
 *
 * Public API:
 * - CallContext
 * - CallCtx
 */

mod core;
mod types;

pub use core::CallCtx;
pub use types::CallContext;
