//! 错误类型定义
//!
//! 内核资源核心分两级错误：
//! - 可恢复错误：通过 [`Result`] 返回（例如构造参数非法）
//! - 不可恢复错误：违反不变量，调用 [`fatal`] 直接终止

use core::fmt;

/// 内核资源操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// 无效参数
    InvalidInput,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;

/// 不可恢复错误
///
/// 只用于调用者的编程错误（持有锁前提被违反、缓存耗尽、非法释放地址等）。
/// 裸机内核之上没有可以恢复的层次，因此记录日志后直接 panic。
#[cold]
#[track_caller]
pub fn fatal(msg: &str) -> ! {
    log::error!("[FATAL] {}", msg);
    panic!("{}", msg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_error_accessors() {
        let err = Error::new(ErrorKind::InvalidInput, "bad range");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.message(), "bad range");
        assert_eq!(err.to_string(), "InvalidInput: bad range");
    }

    #[test]
    #[should_panic(expected = "bget: no buffers")]
    fn test_fatal_panics() {
        fatal("bget: no buffers");
    }
}
