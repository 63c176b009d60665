use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use http_wire::{Request, Version};
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};

use crate::client::Client;
use crate::config::Config;
use crate::error::{Result, ServerError};
use crate::handlers;
use crate::resource::ResourceHost;
use crate::send_queue::SendQueueItem;

/// Flipped to `false` by the installed signal handlers; the only datum
/// shared between the signal-handling context and the event loop.
pub static RUN_FLAG: AtomicBool = AtomicBool::new(true);

const LISTENER_TOKEN: Token = Token(0);
const READ_BUF_SIZE: usize = 4096;
const MAX_SEND_CHUNK: usize = 1400;
const MAX_ALIAS_LEN: usize = 122;
const POLL_TIMEOUT: Duration = Duration::from_secs(2);

/// Allocates ever-increasing `Token`s for accepted connections. `0` is
/// reserved for the listening socket.
struct TokenAllocator {
    next: usize,
}

impl TokenAllocator {
    fn new() -> Self {
        Self { next: 1 }
    }

    fn next_token(&mut self) -> Token {
        let token = Token(self.next);
        self.next += 1;
        token
    }
}

enum WriteStep {
    /// Nothing queued; go back to reading.
    Idle,
    /// Socket would block or the send was partial; wait for the next
    /// WRITE-ready event.
    Pending,
    /// Transport error, or the drained item asked to disconnect.
    Disconnect,
    /// Front item fully sent; `more_pending` says whether to loop again.
    Drained { more_pending: bool },
}

pub struct Server {
    listener: TcpListener,
    port: u16,
    clients: HashMap<Token, Client>,
    tokens: TokenAllocator,
    hosts: Vec<Arc<ResourceHost>>,
    vhosts: HashMap<String, Arc<ResourceHost>>,
}

impl Server {
    pub fn new(config: &Config, poll: &Poll) -> Result<Server> {
        let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
        let mut listener = TcpListener::bind(addr)?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;

        if let (Some(uid), Some(gid)) = (config.drop_uid, config.drop_gid) {
            drop_privileges(uid, gid)?;
        }

        let host = Arc::new(ResourceHost::new(config.diskpath.clone()));
        let mut vhosts = HashMap::new();
        vhosts.insert(format!("localhost:{}", config.port), Arc::clone(&host));
        vhosts.insert(format!("127.0.0.1:{}", config.port), Arc::clone(&host));
        for alias in &config.vhosts {
            if alias.len() >= MAX_ALIAS_LEN {
                srvlog::warn!("vhost alias '{}' rejected: too long", alias);
                continue;
            }
            vhosts.insert(format!("{alias}:{}", config.port), Arc::clone(&host));
        }

        Ok(Server {
            listener,
            port: config.port,
            clients: HashMap::new(),
            tokens: TokenAllocator::new(),
            hosts: vec![host],
            vhosts,
        })
    }

    pub fn run(mut self, mut poll: Poll) -> Result<()> {
        let mut events = Events::with_capacity(1024);

        while RUN_FLAG.load(Ordering::Relaxed) {
            match poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            for event in events.iter() {
                let token = event.token();

                if token == LISTENER_TOKEN {
                    self.accept_connections(&poll);
                    continue;
                }

                if !self.clients.contains_key(&token) {
                    continue;
                }

                if event.is_read_closed() || event.is_error() {
                    self.disconnect_client(&poll, token);
                    continue;
                }

                if event.is_readable() {
                    self.read_client(&poll, token);
                }

                if self.clients.contains_key(&token) && event.is_writable() {
                    self.write_client(&poll, token);
                }
            }
        }

        self.stop(&poll);
        Ok(())
    }

    fn accept_connections(&mut self, poll: &Poll) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    let token = self.tokens.next_token();
                    if poll
                        .registry()
                        .register(&mut stream, token, Interest::READABLE)
                        .is_err()
                    {
                        continue;
                    }
                    srvlog::info!("accepted connection from {}", addr);
                    self.clients.insert(token, Client::new(token, stream, addr));
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(_) => break,
            }
        }
    }

    fn disconnect_client(&mut self, poll: &Poll, token: Token) {
        if let Some(mut client) = self.clients.remove(&token) {
            let _ = poll.registry().deregister(&mut client.stream);
            srvlog::info!("disconnected {}", client.addr);
        }
    }

    fn read_client(&mut self, poll: &Poll, token: Token) {
        let mut buf = [0u8; READ_BUF_SIZE];
        let read_result = match self.clients.get_mut(&token) {
            Some(client) => client.stream.read(&mut buf),
            None => return,
        };

        match read_result {
            Ok(0) => self.disconnect_client(poll, token),
            Ok(n) => {
                let port = self.port;
                let vhosts = &self.vhosts;
                let hosts = &self.hosts;
                let (bytes, disconnect_after) =
                    handlers::handle_request(&buf[..n], |req: &Request| {
                        resolve_host(req, vhosts, hosts, port)
                    });

                if let Some(client) = self.clients.get_mut(&token) {
                    client.enqueue(SendQueueItem::new(bytes, disconnect_after));
                }
                self.reregister(poll, token, Interest::WRITABLE);
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(_) => self.disconnect_client(poll, token),
        }
    }

    /// Sends at most `MAX_SEND_CHUNK` bytes of the front queue item, then
    /// acts on the outcome: re-arms READ when the queue drains, keeps
    /// WRITE armed on a partial send, or tears the connection down.
    fn write_client(&mut self, poll: &Poll, token: Token) {
        loop {
            let step = match self.clients.get_mut(&token) {
                None => return,
                Some(client) => match client.front_mut() {
                    None => WriteStep::Idle,
                    Some(item) => {
                        let attempt = item.remaining().len().min(MAX_SEND_CHUNK);
                        let chunk = item.remaining()[..attempt].to_vec();
                        match client.stream.write(&chunk) {
                            Ok(0) => WriteStep::Disconnect,
                            Ok(n) => {
                                let item = client.front_mut().expect("front item present");
                                item.advance(n);
                                if item.is_fully_sent() {
                                    let disconnect_after = item.disconnect_after();
                                    client.pop_front();
                                    if disconnect_after {
                                        WriteStep::Disconnect
                                    } else {
                                        WriteStep::Drained {
                                            more_pending: client.has_pending_send(),
                                        }
                                    }
                                } else {
                                    WriteStep::Pending
                                }
                            }
                            Err(e) if e.kind() == ErrorKind::WouldBlock => WriteStep::Pending,
                            Err(_) => WriteStep::Disconnect,
                        }
                    }
                },
            };

            match step {
                WriteStep::Idle => {
                    self.reregister(poll, token, Interest::READABLE);
                    return;
                }
                WriteStep::Pending => return,
                WriteStep::Disconnect => {
                    self.disconnect_client(poll, token);
                    return;
                }
                WriteStep::Drained { more_pending: true } => continue,
                WriteStep::Drained { more_pending: false } => {
                    self.reregister(poll, token, Interest::READABLE);
                    return;
                }
            }
        }
    }

    fn reregister(&mut self, poll: &Poll, token: Token, interest: Interest) {
        if let Some(client) = self.clients.get_mut(&token) {
            let _ = poll.registry().reregister(&mut client.stream, token, interest);
        }
    }

    pub fn stop(&mut self, poll: &Poll) {
        let tokens: Vec<Token> = self.clients.keys().copied().collect();
        for token in tokens {
            self.disconnect_client(poll, token);
        }
        self.clients.clear();
        let _ = poll.registry().deregister(&mut self.listener);
    }
}

fn resolve_host(
    req: &Request,
    vhosts: &HashMap<String, Arc<ResourceHost>>,
    hosts: &[Arc<ResourceHost>],
    port: u16,
) -> Option<Arc<ResourceHost>> {
    match req.version() {
        Version::Http11 => {
            let host_header = req.header("host")?;
            let key = if host_header.contains(':') {
                host_header.to_string()
            } else {
                format!("{host_header}:{port}")
            };
            vhosts.get(&key).cloned()
        }
        Version::Http10 => hosts.first().cloned(),
    }
}

fn drop_privileges(uid: u32, gid: u32) -> Result<()> {
    // setgid before setuid: once we drop the uid we may lose permission to
    // change the gid.
    if unsafe { libc::setgid(gid) } != 0 {
        return Err(ServerError::from(format!(
            "setgid({gid}) failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    if unsafe { libc::setuid(uid) } != 0 {
        return Err(ServerError::from(format!(
            "setuid({uid}) failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}
