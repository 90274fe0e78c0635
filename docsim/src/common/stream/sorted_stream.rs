use crate::collection::Document;
use crate::common::SortSpec;
use std::borrow::Borrow;

/// Buffers a document stream and yields it stably sorted by a [SortSpec].
///
/// Documents with equal sort keys keep their incoming order, so an
/// unsorted stream stays in storage order.
pub(crate) struct SortedStream<T> {
    sorted: std::vec::IntoIter<T>,
}

impl<T: Borrow<Document>> SortedStream<T> {
    pub fn new<I: IntoIterator<Item = T>>(raw_stream: I, sort_spec: &SortSpec) -> Self {
        let mut buffer: Vec<T> = raw_stream.into_iter().collect();
        if !sort_spec.is_empty() {
            // slice::sort_by is stable
            buffer.sort_by(|a, b| sort_spec.compare(a.borrow(), b.borrow()));
        }
        SortedStream {
            sorted: buffer.into_iter(),
        }
    }
}

impl<T> Iterator for SortedStream<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.sorted.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.sorted.size_hint()
    }
}
