//! Fake daemon serving canned responses for client tests.
//!
//! Each canned line answers one connection, mirroring the daemon's
//! one-request-per-connection protocol.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};

/// A loopback server answering one connection per canned response line.
pub(crate) struct FakeDaemon {
    port: u16,
    requests: Arc<Mutex<Vec<String>>>,
    result: Arc<Mutex<Option<Result<()>>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FakeDaemon {
    /// Spawns a fake daemon listening on an ephemeral loopback port.
    pub(crate) fn spawn(lines: Vec<String>) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind fake daemon")?;
        listener
            .set_nonblocking(true)
            .context("fake daemon nonblocking")?;
        let port = listener.local_addr().context("local addr")?.port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let result = Arc::new(Mutex::new(None));
        let requests_clone = Arc::clone(&requests);
        let result_clone = Arc::clone(&result);
        let handle = thread::spawn(move || {
            let outcome = serve(&listener, &lines, &requests_clone);
            if let Ok(mut guard) = result_clone.lock() {
                *guard = Some(outcome);
            }
        });
        Ok(Self {
            port,
            requests,
            result,
            handle: Some(handle),
        })
    }

    pub(crate) const fn port(&self) -> u16 {
        self.port
    }

    /// Waits for the server thread and returns every recorded request line.
    pub(crate) fn take_requests(&mut self) -> Result<Vec<String>> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| anyhow!("fake daemon thread panicked"))?;
        }
        if let Some(outcome) = self
            .result
            .lock()
            .map_err(|error| anyhow!("lock fake daemon result: {error}"))?
            .take()
        {
            outcome.context("fake daemon failed")?;
        }
        let requests = self
            .requests
            .lock()
            .map_err(|error| anyhow!("lock requests: {error}"))?;
        Ok(requests.clone())
    }
}

impl Drop for FakeDaemon {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve(listener: &TcpListener, lines: &[String], requests: &Mutex<Vec<String>>) -> Result<()> {
    let deadline = Instant::now() + Duration::from_secs(2);
    for line in lines {
        loop {
            match listener.accept() {
                Ok((stream, _)) => {
                    answer(stream, line, requests)?;
                    break;
                }
                Err(ref error)
                    if error.kind() == io::ErrorKind::WouldBlock && Instant::now() < deadline =>
                {
                    thread::sleep(Duration::from_millis(10));
                }
                // The client gave up before using every response.
                Err(ref error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(error) => return Err(error).context("accept connection"),
            }
        }
    }
    Ok(())
}

fn answer(mut stream: TcpStream, line: &str, requests: &Mutex<Vec<String>>) -> Result<()> {
    stream
        .set_nonblocking(false)
        .context("blocking client stream")?;
    let mut request = String::new();
    BufReader::new(stream.try_clone().context("clone stream")?)
        .read_line(&mut request)
        .context("read request")?;
    requests
        .lock()
        .map_err(|error| anyhow!("lock requests: {error}"))?
        .push(request);
    stream.write_all(line.as_bytes()).context("write response")?;
    stream.write_all(b"\n").context("write newline")?;
    stream.flush().context("flush response")
}
