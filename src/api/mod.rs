// API 调用模块
// 在转发通道上用 hyper 的 HTTP/1.1 客户端连接完成一次请求/响应，返回 InvocationOutcome

use std::io::{self, Write};

use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::client::conn::http1;
use hyper::{header, Method, Request, Response};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::commands::RemoteCommand;
use crate::constants::{PLACEHOLDER_HOST, USER_AGENT};
use crate::error::{Result, TunnelError};

/// 一次 API 调用的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOutcome {
    /// 形如 "200 OK"
    pub status_line: String,
    pub status_code: u16,
    pub body: Vec<u8>,
}

impl InvocationOutcome {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// 2xx 为 0，其余为 1
    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// 输出状态行与 body
    pub fn render<W: Write>(&self, out: &mut W, pretty: bool) -> io::Result<()> {
        writeln!(out, "Status: {}", self.status_line)?;

        let pretty_body = if pretty {
            serde_json::from_slice::<serde_json::Value>(&self.body)
                .ok()
                .and_then(|value| serde_json::to_string_pretty(&value).ok())
        } else {
            None
        };

        match pretty_body {
            Some(text) => writeln!(out, "{}", text)?,
            None => {
                out.write_all(String::from_utf8_lossy(&self.body).as_bytes())?;
                writeln!(out)?;
            }
        }
        out.flush()
    }
}

/// 在通道上执行一次请求/响应
pub async fn invoke<S>(channel: &mut S, command: &RemoteCommand) -> Result<InvocationOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = build_request(command)?;
    debug!("{} {}", command.method, command.path);

    let (mut sender, conn) = http1::handshake::<_, Empty<Bytes>>(TokioIo::new(channel))
        .await
        .map_err(|e| TunnelError::RequestWriteFailed(io::Error::other(e)))?;

    let exchange = async move {
        let response = sender.send_request(request).await.map_err(head_error)?;
        let status_line = status_line(&response);
        let status_code = response.status().as_u16();
        debug!("Response status: {}", status_line);

        let body = match response.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                return Err(TunnelError::ResponseBodyReadFailed {
                    status: status_line,
                    reason: e.to_string(),
                })
            }
        };
        debug!("Read {} body bytes", body.len());

        Ok(InvocationOutcome {
            status_line,
            status_code,
            body: body.to_vec(),
        })
    };

    // 连接与请求在同一任务里并发推进，通道只借用到调用结束
    let (conn_result, outcome) = tokio::join!(conn, exchange);
    if let Err(e) = conn_result {
        debug!("HTTP connection ended with error: {}", e);
    }
    outcome
}

/// 构造请求：Host 固定为占位值，无 body，要求服务端响应后关闭
fn build_request(command: &RemoteCommand) -> Result<Request<Empty<Bytes>>> {
    let invalid = |reason: String| {
        TunnelError::InvalidCommand(format!("{} {}: {}", command.method, command.path, reason))
    };

    let method = Method::from_bytes(command.method.as_bytes()).map_err(|e| invalid(e.to_string()))?;
    let carries_body = method == Method::POST || method == Method::PUT || method == Method::PATCH;

    let mut builder = Request::builder()
        .method(method)
        .uri(command.path.as_str())
        .header(header::HOST, PLACEHOLDER_HOST)
        .header(header::USER_AGENT, USER_AGENT)
        .header(header::CONNECTION, "close");
    if carries_body {
        builder = builder.header(header::CONTENT_LENGTH, "0");
    }

    builder.body(Empty::new()).map_err(|e| invalid(e.to_string()))
}

/// 响应头之前的失败：协议错误或提前断开归为解析失败，其余归为写入失败
fn head_error(e: hyper::Error) -> TunnelError {
    if e.is_parse() || e.is_incomplete_message() {
        TunnelError::ResponseParseFailed(e.to_string())
    } else {
        TunnelError::RequestWriteFailed(io::Error::other(e))
    }
}

/// "200 OK"；保留服务端给出的非标准原因短语
fn status_line<B>(response: &Response<B>) -> String {
    let status = response.status();
    let reason = response
        .extensions()
        .get::<hyper::ext::ReasonPhrase>()
        .map(|r| String::from_utf8_lossy(r.as_bytes()).into_owned())
        .or_else(|| status.canonical_reason().map(str::to_string));

    match reason {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}
