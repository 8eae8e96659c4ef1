use bytes::Buf;
use hyper::body::Body;
use pin_project_lite::pin_project;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

pin_project! {
    /// Reads a body to its end, discarding the data and counting the bytes.
    ///
    /// A response body has to be consumed before hyper hands the connection back
    /// to the pool, so this is what allows a keep-alive session to reuse its socket.
    pub struct DrainBodyFuture<B: Body> {
        #[pin]
        body: B,
        drained: usize,
    }
}

impl<B> DrainBodyFuture<B>
where
    B: Body,
{
    #[inline]
    #[must_use]
    pub fn new(body: B) -> Self {
        Self { body, drained: 0 }
    }
}

impl<B> Future for DrainBodyFuture<B>
where
    B: Body,
    B::Error: Display,
{
    type Output = Result<usize, anyhow::Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slf = self.project();
        loop {
            let Some(next_res) = ready!(slf.body.as_mut().poll_frame(cx)) else {
                return Poll::Ready(Ok(*slf.drained));
            };
            let frame = match next_res {
                Ok(frame) => frame,
                Err(e) => {
                    return Poll::Ready(Err(anyhow::anyhow!("Failed to poll next frame: {e}")));
                }
            };
            // Trailers carry no payload
            if let Some(data) = frame.data_ref() {
                *slf.drained += data.remaining();
            }
            if slf.body.is_end_stream() {
                return Poll::Ready(Ok(*slf.drained));
            }
        }
    }
}
