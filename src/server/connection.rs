use crate::{
    errors::Error,
    http::{request::Env, types::slice_to_usize},
    limits::{ConnLimits, ReqLimits},
    log,
    server::app::{error_response, App},
};
use memchr::{memchr, memmem};
use std::{future::Future, io, mem, net::SocketAddr, time::Instant};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

/// Transport that delivers whole raw requests and accepts raw responses.
///
/// The [`App`] never touches sockets; everything it learns about the peer
/// comes through [`attributes`](Connection::attributes), which end up in
/// the request's server parameters.
pub trait Connection: Send {
    /// Next raw request: head plus exactly `content-length` body bytes.
    ///
    /// `Ok(None)` when the peer closed the connection between requests.
    fn receive(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>, Error>> + Send;

    fn send(&mut self, bytes: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Per-connection environment, e.g. peer and local addresses.
    fn attributes(&self) -> Env;
}

/// [`Connection`] over a byte stream, a [`TcpStream`] by default.
///
/// Bytes read past the end of one request are kept for the next one, so
/// pipelined requests are served in order.
pub struct TcpConnection<S = TcpStream> {
    stream: S,
    buffer: Vec<u8>,
    env: Env,

    conn_limits: ConnLimits,
    req_limits: ReqLimits,
}

impl TcpConnection {
    /// Wraps an accepted socket; the environment holds `remote_addr`,
    /// `remote_port`, `server_addr` and `server_port`.
    pub fn accepted(
        stream: TcpStream,
        peer: SocketAddr,
        conn_limits: ConnLimits,
        req_limits: ReqLimits,
    ) -> Self {
        let mut env = Env::new();
        env.insert("remote_addr".to_string(), peer.ip().to_string());
        env.insert("remote_port".to_string(), peer.port().to_string());

        if let Ok(local) = stream.local_addr() {
            env.insert("server_addr".to_string(), local.ip().to_string());
            env.insert("server_port".to_string(), local.port().to_string());
        }

        Self::new(stream, env, conn_limits, req_limits)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> TcpConnection<S> {
    #[inline]
    pub fn new(stream: S, env: Env, conn_limits: ConnLimits, req_limits: ReqLimits) -> Self {
        Self {
            stream,
            buffer: Vec::with_capacity(1024),
            env,
            conn_limits,
            req_limits,
        }
    }

    async fn fill(&mut self) -> io::Result<usize> {
        let mut chunk = [0; 4096];
        let read = timeout(
            self.conn_limits.socket_read_timeout,
            self.stream.read(&mut chunk),
        )
        .await??;

        self.buffer.extend_from_slice(&chunk[..read]);
        Ok(read)
    }

    async fn read_request(&mut self) -> Result<Option<Vec<u8>>, Error> {
        let head_size = loop {
            if let Some(pos) = memmem::find(&self.buffer, b"\r\n\r\n") {
                break pos + 4;
            }
            if self.buffer.len() > self.req_limits.head_size {
                return Err(Error::HeadTooLarge(self.req_limits.head_size));
            }

            if self.fill().await? == 0 {
                // An unterminated head is still handed over, the codec rejects it
                return match self.buffer.is_empty() {
                    true => Ok(None),
                    false => Ok(Some(mem::take(&mut self.buffer))),
                };
            }
        };

        if head_size > self.req_limits.head_size {
            return Err(Error::HeadTooLarge(self.req_limits.head_size));
        }

        let body_size = content_length(&self.buffer[..head_size])?;
        if body_size > self.req_limits.body_size {
            return Err(Error::BodyTooLarge(self.req_limits.body_size));
        }

        let total = head_size + body_size;
        while self.buffer.len() < total {
            if self.fill().await? == 0 {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            }
        }

        let rest = self.buffer.split_off(total);
        Ok(Some(mem::replace(&mut self.buffer, rest)))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> Connection for TcpConnection<S> {
    #[inline]
    fn receive(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>, Error>> + Send {
        self.read_request()
    }

    #[inline]
    fn send(&mut self, bytes: &[u8]) -> impl Future<Output = io::Result<()>> + Send {
        async move {
            timeout(
                self.conn_limits.socket_write_timeout,
                self.stream.write_all(bytes),
            )
            .await?
        }
    }

    #[inline]
    fn attributes(&self) -> Env {
        self.env.clone()
    }
}

/// `content-length` of a raw head, `0` when absent.
fn content_length(head: &[u8]) -> Result<usize, Error> {
    for line in head.split(|&byte| byte == b'\n') {
        let Some(colon) = memchr(b':', line) else {
            continue;
        };

        if trim(&line[..colon]).eq_ignore_ascii_case(b"content-length") {
            return slice_to_usize(trim(&line[colon + 1..]))
                .ok_or(Error::Malformed("invalid content-length"));
        }
    }

    Ok(0)
}

#[inline]
fn trim(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        match first.is_ascii_whitespace() {
            true => bytes = rest,
            false => break,
        }
    }
    while let [rest @ .., last] = bytes {
        match last.is_ascii_whitespace() {
            true => bytes = rest,
            false => break,
        }
    }
    bytes
}

/// Serves requests from `conn` until it closes, expires, or a response
/// asks to close it.
///
/// Oversized and unreadable requests are answered with their error status
/// before closing. I/O failures end the connection silently.
pub async fn serve<C: Connection>(conn: &mut C, app: &App, limits: &ConnLimits) -> io::Result<()> {
    let created = Instant::now();
    let mut served = 0;

    loop {
        let raw = match conn.receive().await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(()),
            Err(Error::Io(err)) => return Err(err),
            Err(err) => {
                log::debug!("rejected request: {}", err);

                let mut response = error_response(&err);
                response.close();
                return conn.send(&app.get_codec().encode(&response)).await;
            }
        };

        served += 1;
        let mut response = app.respond(&raw, conn.attributes());

        if served >= limits.max_requests_per_connection
            || created.elapsed() > limits.connection_lifetime
        {
            response.close();
        }

        conn.send(&app.get_codec().encode(&response)).await?;

        if !response.is_keep_alive() {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pipeline::registry::Registry,
        routing::{
            router::Router,
            rule::{BoundArgs, Rule, Target},
        },
        Request, Response,
    };
    use std::sync::Arc;
    use tokio::io::{duplex, DuplexStream};

    fn app() -> App {
        let registry = Registry::new().with_action("Echo", "body", |req: &mut Request, _: &BoundArgs| {
            let mut resp = Response::new();
            resp.body(req.body().to_vec());
            resp
        });

        let mut router = Router::new();
        let rule = Rule::new("/echo", ["POST", "GET"], Vec::<String>::new(), Target::new("Echo", "body"), &registry);
        router.register(rule.unwrap());

        App::new(router, Arc::new(registry))
    }

    fn connection(stream: DuplexStream) -> TcpConnection<DuplexStream> {
        let req_limits = ReqLimits {
            head_size: 128,
            body_size: 16,
            ..ReqLimits::default()
        };
        TcpConnection::new(stream, Env::new(), ConnLimits::default(), req_limits)
    }

    async fn exchange(input: &[u8], limits: ConnLimits) -> String {
        let (mut client, server) = duplex(64 * 1024);
        client.write_all(input).await.unwrap();
        client.shutdown().await.unwrap();

        let mut conn = connection(server);
        serve(&mut conn, &app(), &limits).await.unwrap();
        drop(conn);

        let mut output = String::new();
        client.read_to_string(&mut output).await.unwrap();
        output
    }

    #[test]
    fn content_length_lookup() {
        #[rustfmt::skip]
        let cases: [(&[u8], Option<usize>); 5] = [
            (b"POST / HTTP/1.1\r\nContent-Length: 12\r\n\r\n",  Some(12)),
            (b"POST / HTTP/1.1\r\ncontent-length:3\r\n\r\n",    Some(3)),
            (b"GET / HTTP/1.1\r\nHost: x\r\n\r\n",              Some(0)),
            (b"POST / HTTP/1.1\r\nContent-Length: -1\r\n\r\n",  None),
            (b"POST / HTTP/1.1\r\nContent-Length: \r\n\r\n",    None),
        ];

        for (head, expected) in cases {
            assert_eq!(content_length(head).ok(), expected, "{}", String::from_utf8_lossy(head));
        }
    }

    #[tokio::test]
    async fn pipelined_requests() {
        let output = exchange(
            b"POST /echo HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcPOST /echo HTTP/1.1\r\nContent-Length: 2\r\n\r\nxy",
            ConnLimits::default(),
        )
        .await;

        let responses: Vec<_> = output.split("HTTP/1.1 200 OK").skip(1).collect();
        assert_eq!(responses.len(), 2);
        assert!(responses[0].ends_with("\r\n\r\nabc"));
        assert!(responses[1].ends_with("\r\n\r\nxy"));
    }

    #[tokio::test]
    async fn request_budget_closes() {
        let limits = ConnLimits {
            max_requests_per_connection: 1,
            ..ConnLimits::default()
        };
        let output = exchange(
            b"GET /echo HTTP/1.1\r\n\r\nGET /echo HTTP/1.1\r\n\r\n",
            limits,
        )
        .await;

        assert_eq!(output.matches("HTTP/1.1 200 OK").count(), 1);
        assert!(output.contains("connection: close"));
    }

    #[tokio::test]
    async fn oversized_requests() {
        #[rustfmt::skip]
        let cases: [(&[u8], &str); 3] = [
            (b"POST /echo HTTP/1.1\r\nContent-Length: 17\r\n\r\n",  "HTTP/1.1 413 Payload Too Large\r\n"),
            (&[b'a'; 200],                                           "HTTP/1.1 431 Request Header Fields Too Large\r\n"),
            (b"POST /echo HTTP/1.1\r\nContent-Length: x\r\n\r\n",   "HTTP/1.1 400 Bad Request\r\n"),
        ];

        for (input, status_line) in cases {
            let output = exchange(input, ConnLimits::default()).await;
            assert!(output.starts_with(status_line), "{output}");
            assert!(output.contains("connection: close"));
        }
    }

    #[tokio::test]
    async fn unterminated_head() {
        let output = exchange(b"GET /echo HTTP/1.1\r\n", ConnLimits::default()).await;
        assert!(output.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{output}");
    }

    #[tokio::test]
    async fn truncated_body() {
        let (mut client, server) = duplex(1024);
        client
            .write_all(b"POST /echo HTTP/1.1\r\nContent-Length: 9\r\n\r\nabc")
            .await
            .unwrap();
        client.shutdown().await.unwrap();

        let mut conn = connection(server);
        assert!(matches!(conn.receive().await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn closed_between_requests() {
        let (client, server) = duplex(1024);
        drop(client);

        let mut conn = connection(server);
        assert!(conn.receive().await.unwrap().is_none());
    }
}
