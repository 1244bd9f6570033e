//! Loopback end-to-end tests driving a real server through a real client.
//!
//! Covers the concrete request/response scenarios a host integrator would
//! exercise first: ping, module-base lookup, absolute read, write-then-read,
//! a pointer chain on a 32-bit target, a pointer chain that null-derefs
//! mid-walk, and the two framing-error cases that still answer with an
//! `ERROR_RESP` (bad version, oversize payload).

use std::time::Duration;

use ceqp_client::{Client, ClientError};
use ceqp_core::target::Arch;
use ceqp_proto::{FrameHeader, Opcode};
use ceqp_server::{demo::DemoTarget, server::Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn start(target: DemoTarget, port: u16) -> Server<DemoTarget> {
    let server = Server::new(target);
    assert!(server.start(port).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    server
}

#[tokio::test]
async fn ping() {
    let server = start(DemoTarget::new(64, Arch::X64), 31_101).await;
    let mut client = Client::connect(("127.0.0.1", 31_101)).await.unwrap();

    client.ping().await.unwrap();

    server.stop().await;
}

#[tokio::test]
async fn get_module_base() {
    let server = start(DemoTarget::new(1024, Arch::X64), 31_102).await;
    let mut client = Client::connect(("127.0.0.1", 31_102)).await.unwrap();

    let base = client.get_mod_base("game.exe").await.unwrap();

    assert_eq!(base, DemoTarget::BASE);
    server.stop().await;
}

#[tokio::test]
async fn read_absolute() {
    let target = DemoTarget::new(1024, Arch::X64);
    target.seed(DemoTarget::BASE + 32, &[0xDE, 0xAD, 0xBE, 0xEF]);
    let server = start(target, 31_103).await;
    let mut client = Client::connect(("127.0.0.1", 31_103)).await.unwrap();

    let data = client.read_mem(DemoTarget::BASE + 32, 4).await.unwrap();

    assert_eq!(data, vec![0xDE, 0xAD, 0xBE, 0xEF]);
    server.stop().await;
}

#[tokio::test]
async fn write_then_read() {
    let server = start(DemoTarget::new(1024, Arch::X64), 31_104).await;
    let mut client = Client::connect(("127.0.0.1", 31_104)).await.unwrap();

    client.write_mem(DemoTarget::BASE + 100, &[1, 2, 3, 4, 5]).await.unwrap();
    let data = client.read_mem(DemoTarget::BASE + 100, 5).await.unwrap();

    assert_eq!(data, vec![1, 2, 3, 4, 5]);
    server.stop().await;
}

#[tokio::test]
async fn pointer_chain_on_32bit_target() {
    let target = DemoTarget::new(1024, Arch::X86);
    target.seed(DemoTarget::BASE + 0x100, &(DemoTarget::BASE as u32 + 0x200).to_le_bytes());
    target.seed(DemoTarget::BASE + 0x210, &0xCAFE_BABEu32.to_le_bytes());
    let server = start(target, 31_105).await;
    let mut client = Client::connect(("127.0.0.1", 31_105)).await.unwrap();

    let data = client
        .read_ptr_chain(DemoTarget::BASE + 0x100, &[0x10], Some(4), Some("ptr32"))
        .await
        .unwrap();

    assert_eq!(data, 0xCAFE_BABEu32.to_le_bytes());
    server.stop().await;
}

#[tokio::test]
async fn pointer_chain_null_deref() {
    let target = DemoTarget::new(1024, Arch::X64);
    // base+0x100 holds an 8-byte zero pointer: the walk null-derefs at step 0.
    let server = start(target, 31_106).await;
    let mut client = Client::connect(("127.0.0.1", 31_106)).await.unwrap();

    let err = client.read_ptr_chain(DemoTarget::BASE + 0x100, &[0x10], Some(4), None).await.unwrap_err();

    match err {
        ClientError::Server { code, message } => {
            assert_eq!(code, 14);
            assert!(message.contains("step 0"));
        },
        other => panic!("expected a server error, got {other:?}"),
    }
    server.stop().await;
}

#[tokio::test]
async fn bad_version_gets_error_resp_and_closes_session() {
    let server = start(DemoTarget::new(64, Arch::X64), 31_107).await;
    let mut stream = TcpStream::connect(("127.0.0.1", 31_107)).await.unwrap();

    let mut wire = FrameHeader::new(Opcode::Ping.to_u8(), 1, 0).to_bytes();
    wire[4] = 99; // corrupt the version byte after building a well-formed header
    stream.write_all(&wire).await.unwrap();

    let mut response = vec![0u8; 16];
    stream.read_exact(&mut response).await.unwrap();
    let header = FrameHeader::parse(&response).unwrap();
    assert_eq!(header.frame_type, Opcode::ErrorResp.to_u8());
    assert_eq!(header.request_id, 1, "framing error must echo the request's id");

    let mut payload = vec![0u8; header.payload_len as usize];
    stream.read_exact(&mut payload).await.unwrap();
    let records = ceqp_proto::tlv::decode(&bytes::Bytes::from(payload));
    assert_eq!(ceqp_proto::tlv::require_u32(&records, ceqp_proto::tlv::tag::ERRCODE, "ERRCODE").unwrap(), 101);

    // the session is torn down after a framing error; the socket now yields EOF.
    let mut buf = [0u8; 1];
    assert_eq!(stream.read(&mut buf).await.unwrap_or(0), 0);

    server.stop().await;
}

#[tokio::test]
async fn oversize_payload_gets_error_resp_and_closes_session() {
    let server = start(DemoTarget::new(64, Arch::X64), 31_108).await;
    let mut stream = TcpStream::connect(("127.0.0.1", 31_108)).await.unwrap();

    let over = ceqp_proto::MAX_PAYLOAD_SIZE + 1;
    let mut wire = FrameHeader::new(Opcode::Ping.to_u8(), 1, 0).to_bytes();
    wire[12..16].copy_from_slice(&over.to_le_bytes());
    stream.write_all(&wire).await.unwrap();

    let mut response = vec![0u8; 16];
    stream.read_exact(&mut response).await.unwrap();
    let header = FrameHeader::parse(&response).unwrap();
    assert_eq!(header.frame_type, Opcode::ErrorResp.to_u8());
    assert_eq!(header.request_id, 1, "framing error must echo the request's id");

    let mut payload = vec![0u8; header.payload_len as usize];
    stream.read_exact(&mut payload).await.unwrap();
    let records = ceqp_proto::tlv::decode(&bytes::Bytes::from(payload));
    assert_eq!(ceqp_proto::tlv::require_u32(&records, ceqp_proto::tlv::tag::ERRCODE, "ERRCODE").unwrap(), 102);

    server.stop().await;
}

