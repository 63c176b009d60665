use std::collections::VecDeque;
use std::net::SocketAddr;

use mio::Token;
use mio::net::TcpStream;

use crate::send_queue::SendQueueItem;

/// One accepted TCP connection. Holds no inbound buffer: a request is read
/// and parsed entirely within a single READABLE event, so there is nothing
/// to carry between reads on the client side.
pub struct Client {
    pub token: Token,
    pub stream: TcpStream,
    pub addr: SocketAddr,
    send_queue: VecDeque<SendQueueItem>,
}

impl Client {
    pub fn new(token: Token, stream: TcpStream, addr: SocketAddr) -> Self {
        Self {
            token,
            stream,
            addr,
            send_queue: VecDeque::new(),
        }
    }

    pub fn enqueue(&mut self, item: SendQueueItem) {
        self.send_queue.push_back(item);
    }

    pub fn has_pending_send(&self) -> bool {
        !self.send_queue.is_empty()
    }

    pub fn front_mut(&mut self) -> Option<&mut SendQueueItem> {
        self.send_queue.front_mut()
    }

    pub fn pop_front(&mut self) {
        self.send_queue.pop_front();
    }
}
