/// A single piece of outbound data sitting in a client's send queue.
///
/// `data` is immutable once enqueued; `offset` tracks how much of it has
/// been written to the socket so a partial send can resume without
/// re-copying or re-serializing anything. `disconnect_after` marks the
/// last item of a response that must close the connection once fully
/// drained (HTTP/1.0, `Connection: close`, or an error response).
#[derive(Debug)]
pub struct SendQueueItem {
    data: Vec<u8>,
    offset: usize,
    disconnect_after: bool,
}

impl SendQueueItem {
    pub fn new(data: Vec<u8>, disconnect_after: bool) -> Self {
        Self {
            data,
            offset: 0,
            disconnect_after,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> &[u8] {
        &self.data[self.offset..]
    }

    pub fn advance(&mut self, n: usize) {
        self.offset += n;
    }

    pub fn is_fully_sent(&self) -> bool {
        self.offset >= self.data.len()
    }

    pub fn disconnect_after(&self) -> bool {
        self.disconnect_after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_and_reports_completion() {
        let mut item = SendQueueItem::new(b"hello".to_vec(), true);
        assert_eq!(item.remaining(), b"hello");
        item.advance(3);
        assert_eq!(item.remaining(), b"lo");
        assert!(!item.is_fully_sent());
        item.advance(2);
        assert!(item.is_fully_sent());
        assert!(item.disconnect_after());
    }
}
