//! Stitching early output back onto the response body.

use std::io;

use bytes::Bytes;

use crate::pipeline::ResponseBody;

/// Chunks written before the handler returned, followed by its returned body.
///
/// The returned body is pulled lazily and only once, as the caller consumes the result.
pub fn reconcile(early_chunks: Vec<Bytes>, body: ResponseBody) -> ResponseBody {
    if early_chunks.is_empty() {
        return body;
    }
    Box::new(
        early_chunks
            .into_iter()
            .map(Ok::<Bytes, io::Error>)
            .chain(body),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn collect(body: ResponseBody) -> Vec<Bytes> {
        body.collect::<io::Result<Vec<_>>>().unwrap()
    }

    #[test]
    fn test_early_chunks_come_first() {
        let body = crate::pipeline::chunks(vec!["c", "d"]);
        let out = collect(reconcile(vec![Bytes::from("a"), Bytes::from("b")], body));
        assert_eq!(out, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_body_is_pulled_lazily() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let body: ResponseBody = Box::new((0..3).map(move |i| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<Bytes, io::Error>(Bytes::from(i.to_string()))
        }));

        let mut out = reconcile(vec![Bytes::from("early")], body);
        assert_eq!(pulled.load(Ordering::SeqCst), 0);

        assert_eq!(out.next().unwrap().unwrap(), "early");
        assert_eq!(pulled.load(Ordering::SeqCst), 0);

        assert_eq!(out.next().unwrap().unwrap(), "0");
        assert_eq!(pulled.load(Ordering::SeqCst), 1);

        assert_eq!(out.count(), 2);
        assert_eq!(pulled.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_body_errors_pass_through() {
        let body: ResponseBody = Box::new(
            vec![
                Ok(Bytes::from("ok")),
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone")),
            ]
            .into_iter(),
        );
        let results: Vec<_> = reconcile(vec![Bytes::from("early")], body).collect();
        assert_eq!(results.len(), 3);
        assert!(results[2].is_err());
    }
}
