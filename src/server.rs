use std::net::SocketAddr;

use anyhow::{Context, anyhow};
use rosc::{OscMessage, OscPacket, OscType, decoder, encoder};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream, tcp::OwnedReadHalf},
    sync::mpsc,
};

use crate::{
    protocol::{Argument, ClientId, Outbound, Request},
    registry::ClientRegistry,
    router::Router,
};

const END: u8 = 0xC0;
const ESC: u8 = 0xDB;
const ESC_END: u8 = 0xDC;
const ESC_ESC: u8 = 0xDD;

/// Incremental SLIP decoder. Bytes may arrive split anywhere, frames are
/// returned once their closing `END` has been seen.
#[derive(Debug, Default)]
pub struct SlipDecoder {
    frame: Vec<u8>,
    escaped: bool,
}

impl SlipDecoder {
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        for &byte in bytes {
            if self.escaped {
                self.escaped = false;
                match byte {
                    ESC_END => self.frame.push(END),
                    ESC_ESC => self.frame.push(ESC),
                    other => {
                        log::warn!("Invalid SLIP escape 0x{:02X}, dropping frame.", other);
                        self.frame.clear();
                    }
                }
                continue;
            }
            match byte {
                END => {
                    if !self.frame.is_empty() {
                        frames.push(std::mem::take(&mut self.frame));
                    }
                }
                ESC => self.escaped = true,
                other => self.frame.push(other),
            }
        }
        frames
    }
}

/// Double-ended SLIP: `END` both opens and closes the frame.
pub fn slip_encode(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 2);
    out.push(END);
    for &byte in payload {
        match byte {
            END => out.extend_from_slice(&[ESC, ESC_END]),
            ESC => out.extend_from_slice(&[ESC, ESC_ESC]),
            other => out.push(other),
        }
    }
    out.push(END);
    out
}

fn to_argument(arg: OscType) -> Option<Argument> {
    match arg {
        OscType::Int(i) => Some(Argument::Int(i64::from(i))),
        OscType::Long(i) => Some(Argument::Int(i)),
        OscType::Float(f) => Some(Argument::Float(f64::from(f))),
        OscType::Double(f) => Some(Argument::Float(f)),
        OscType::String(s) => Some(Argument::Str(s)),
        OscType::Char(c) => Some(Argument::Str(c.to_string())),
        OscType::Bool(b) => Some(Argument::Bool(b)),
        other => {
            log::debug!("Ignoring unsupported OSC argument {:?}.", other);
            None
        }
    }
}

fn flatten(packet: OscPacket, messages: &mut Vec<OscMessage>) {
    match packet {
        OscPacket::Message(message) => messages.push(message),
        OscPacket::Bundle(bundle) => {
            for packet in bundle.content {
                flatten(packet, messages);
            }
        }
    }
}

/// Decodes one SLIP payload. Bundles are flattened in order.
pub fn decode_frame(frame: &[u8]) -> anyhow::Result<Vec<(String, Vec<Argument>)>> {
    let (_, packet) =
        decoder::decode_udp(frame).map_err(|e| anyhow!("Invalid OSC packet: {:?}", e))?;
    let mut messages = Vec::new();
    flatten(packet, &mut messages);
    Ok(messages
        .into_iter()
        .map(|m| (m.addr, m.args.into_iter().filter_map(to_argument).collect()))
        .collect())
}

/// Encodes an outbound message as an OSC message carrying its JSON body,
/// SLIP framed.
pub fn encode_outbound(message: &Outbound) -> anyhow::Result<Vec<u8>> {
    let packet = OscPacket::Message(OscMessage {
        addr: message.path.clone(),
        args: vec![OscType::String(message.envelope.encode())],
    });
    let bytes = encoder::encode(&packet)
        .map_err(|e| anyhow!("Failed to encode OSC message '{}': {:?}", message.path, e))?;
    Ok(slip_encode(&bytes))
}

pub struct OscServer {
    listener: TcpListener,
    router: Router,
    registry: ClientRegistry,
}

impl OscServer {
    pub async fn bind(addr: &str, router: Router, registry: ClientRegistry) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind OSC server to {}", addr))?;
        Ok(Self {
            listener,
            router,
            registry,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read OSC server address")
    }

    pub async fn run(self) -> anyhow::Result<()> {
        log::info!("OSC server listening on {}.", self.local_addr()?);
        loop {
            let (socket, addr) = self
                .listener
                .accept()
                .await
                .context("Failed to accept OSC connection")?;
            let client = ClientId(addr);
            log::debug!("Connection from {}.", client);

            let router = self.router.clone();
            let registry = self.registry.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(socket, client, router).await {
                    log::warn!("Connection to {} failed: {:#}", client, e);
                }
                registry.forget(&client).await;
                log::debug!("Connection from {} closed.", client);
            });
        }
    }
}

async fn handle_connection(socket: TcpStream, client: ClientId, router: Router) -> anyhow::Result<()> {
    let (reader, mut writer) = socket.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    let write_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let bytes = match encode_outbound(&message) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::error!("{:#}", e);
                    continue;
                }
            };
            if writer.write_all(&bytes).await.is_err() {
                break;
            }
        }
    });

    let result = read_loop(reader, client, &router, tx).await;
    write_task.abort();
    result
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    client: ClientId,
    router: &Router,
    reply_tx: mpsc::UnboundedSender<Outbound>,
) -> anyhow::Result<()> {
    let mut decoder = SlipDecoder::default();
    let mut buf = vec![0u8; 4096];
    loop {
        let n = reader
            .read(&mut buf)
            .await
            .with_context(|| format!("Failed to read from {}", client))?;
        if n == 0 {
            return Ok(());
        }
        for frame in decoder.feed(&buf[..n]) {
            let messages = match decode_frame(&frame) {
                Ok(messages) => messages,
                Err(e) => {
                    log::warn!("Dropping frame from {}: {:#}", client, e);
                    continue;
                }
            };
            for (path, args) in messages {
                log::trace!("{} -> {} {:?}", client, path, args);
                router
                    .handle(Request {
                        path,
                        args,
                        sender: client,
                        reply_tx: reply_tx.clone(),
                    })
                    .await;
            }
        }
    }
}
