pub mod http_status;
pub mod listing;
pub mod request_handler;

use log::{debug, error, info};
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;
use threadpool::ThreadPool;

pub const WORKER_THREADS: usize = 8;

/// Static file server rooted at a directory, one request per connection.
pub struct StaticServer {
    root: Arc<PathBuf>,
    listener: TcpListener,
    thread_pool: ThreadPool,
}

impl StaticServer {
    pub fn bind(port: u16, root: PathBuf) -> io::Result<Self> {
        Self::bind_addr(SocketAddr::from(([0, 0, 0, 0], port)), root)
    }

    pub fn bind_addr(addr: SocketAddr, root: PathBuf) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        let local = listener.local_addr()?;

        info!(
            "Serving HTTP on {} port {} (http://{}/) ...",
            local.ip(),
            local.port(),
            local
        );
        debug!("Document root: {:?}", root);

        Ok(Self {
            root: Arc::new(root),
            listener,
            thread_pool: ThreadPool::new(WORKER_THREADS),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn run(&self) {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let root = Arc::clone(&self.root);
                    self.thread_pool.execute(move || {
                        request_handler::handle_client(stream, &root);
                    });
                }
                Err(e) => error!("Error accepting connection: {}", e),
            }
        }
    }
}
