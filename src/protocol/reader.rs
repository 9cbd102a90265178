use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

/// Line reader over git's stdin that can switch to raw bytes mid-stream.
///
/// Lines and the raw tail share one buffer, so bytes already buffered while
/// reading the last line are not lost when switching to `read_remaining`.
pub struct LineReader<R> {
    inner: BufReader<R>,
    line: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            inner: BufReader::new(input),
            line: Vec::new(),
        }
    }

    /// Next line without its terminator, or `None` at end of input
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.line.clear();
        let n = self.inner.read_until(b'\n', &mut self.line).await?;
        if n == 0 {
            return Ok(None);
        }
        if self.line.last() == Some(&b'\n') {
            self.line.pop();
            if self.line.last() == Some(&b'\r') {
                self.line.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&self.line).into_owned()))
    }

    /// Everything left on the stream
    pub async fn read_remaining(&mut self) -> std::io::Result<Bytes> {
        let mut rest = Vec::new();
        self.inner.read_to_end(&mut rest).await?;
        Ok(Bytes::from(rest))
    }
}
