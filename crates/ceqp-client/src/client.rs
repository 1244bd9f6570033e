//! Client adapter: typed request methods over a CEQP TCP connection.
//!
//! Mirrors the dispatcher on the outbound side: builds a payload with
//! [`ceqp_proto::tlv::Writer`], sends it framed, and parses the typed
//! response back out. One request is in flight at a time — there is no
//! pipelining, so the monotonic `request_id` is advisory bookkeeping
//! rather than a correlation key.

use std::sync::atomic::{AtomicU32, Ordering};

use ceqp_proto::{
    read_frame,
    tlv::{self, Writer},
    write_frame, Frame, Opcode,
};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::{ClientError, Result};

/// A connected CEQP client.
pub struct Client {
    stream: TcpStream,
    next_request_id: AtomicU32,
    last_error: Option<String>,
}

impl Client {
    /// Connect to a CEQP server at `addr`.
    ///
    /// # Errors
    ///
    /// [`ClientError::Connect`] if the TCP connection cannot be established.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream =
            TcpStream::connect(addr).await.map_err(|err| ClientError::Connect(err.to_string()))?;
        if let Err(err) = stream.set_nodelay(true) {
            tracing::warn!("failed to set TCP_NODELAY: {err}");
        }
        Ok(Self { stream, next_request_id: AtomicU32::new(1), last_error: None })
    }

    /// The most recent error returned by a request method, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn next_id(&self) -> u32 {
        self.next_request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Send `payload` under `opcode`, read back one frame, and surface
    /// `ERROR_RESP` as [`ClientError::Server`]. Records the outcome in
    /// [`Client::last_error`].
    async fn roundtrip(&mut self, opcode: Opcode, payload: Vec<u8>) -> Result<Frame> {
        let result = self.roundtrip_inner(opcode, payload).await;
        self.last_error = result.as_ref().err().map(ToString::to_string);
        result
    }

    async fn roundtrip_inner(&mut self, opcode: Opcode, payload: Vec<u8>) -> Result<Frame> {
        let request_id = self.next_id();
        let request = Frame::new(opcode.to_u8(), request_id, payload);
        write_frame(&mut self.stream, &request).await?;
        let response = read_frame(&mut self.stream).await?;

        if response.header.frame_type == Opcode::ErrorResp.to_u8() {
            let records = tlv::decode(&response.payload);
            let code = tlv::require_u32(&records, tlv::tag::ERRCODE, "ERRCODE")?;
            let message = tlv::require_string(&records, tlv::tag::ERRMSG, "ERRMSG")?;
            return Err(ClientError::Server { code, message });
        }

        Ok(response)
    }

    /// `PING` — no fields, `PING_RESP` on success.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn ping(&mut self) -> Result<()> {
        let response = self.roundtrip(Opcode::Ping, Vec::new()).await?;
        expect_opcode(&response, Opcode::PingResp)?;
        Ok(())
    }

    /// `READ_MEM` at an absolute address.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn read_mem(&mut self, addr: u64, len: u32) -> Result<Vec<u8>> {
        let payload = Writer::new().put_u64(tlv::tag::ADDR, addr).put_u32(tlv::tag::LEN, len).finish();
        let response = self.roundtrip(Opcode::ReadMem, payload).await?;
        expect_opcode(&response, Opcode::ReadMem)?;
        take_data(&response)
    }

    /// `WRITE_MEM` at an absolute address.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn write_mem(&mut self, addr: u64, data: &[u8]) -> Result<()> {
        let payload = Writer::new().put_u64(tlv::tag::ADDR, addr).put_bytes(tlv::tag::DATA, data).finish();
        let response = self.roundtrip(Opcode::WriteMem, payload).await?;
        expect_opcode(&response, Opcode::WriteMem)?;
        Ok(())
    }

    /// `READ_MOD_OFFSET`: read relative to a named module's base.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn read_mod_offset(&mut self, modname: &str, offset: i64, len: u32) -> Result<Vec<u8>> {
        let payload = Writer::new()
            .put_str(tlv::tag::MODNAME, modname)
            .put_i64(tlv::tag::OFFSET, offset)
            .put_u32(tlv::tag::LEN, len)
            .finish();
        let response = self.roundtrip(Opcode::ReadModOffset, payload).await?;
        expect_opcode(&response, Opcode::ReadModOffset)?;
        take_data(&response)
    }

    /// `WRITE_MOD_OFFSET`: write relative to a named module's base.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn write_mod_offset(&mut self, modname: &str, offset: i64, data: &[u8]) -> Result<()> {
        let payload = Writer::new()
            .put_str(tlv::tag::MODNAME, modname)
            .put_i64(tlv::tag::OFFSET, offset)
            .put_bytes(tlv::tag::DATA, data)
            .finish();
        let response = self.roundtrip(Opcode::WriteModOffset, payload).await?;
        expect_opcode(&response, Opcode::WriteModOffset)?;
        Ok(())
    }

    /// `READ_PTR_CHAIN`: walk `offsets` from `addr`, then read `len` bytes
    /// (defaults to the pointer width when `None`) at the final address.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn read_ptr_chain(
        &mut self,
        addr: u64,
        offsets: &[i64],
        len: Option<u32>,
        dtype: Option<&str>,
    ) -> Result<Vec<u8>> {
        let mut writer = Writer::new().put_u64(tlv::tag::ADDR, addr).put_offsets(tlv::tag::OFFSETS, offsets);
        if let Some(len) = len {
            writer = writer.put_u32(tlv::tag::LEN, len);
        }
        if let Some(dtype) = dtype {
            writer = writer.put_str(tlv::tag::DTYPE, dtype);
        }
        let response = self.roundtrip(Opcode::ReadPtrChain, writer.finish()).await?;
        expect_opcode(&response, Opcode::ReadPtrChain)?;
        take_data(&response)
    }

    /// `WRITE_PTR_CHAIN`: walk `offsets` from `addr`, then write `data` at
    /// the final address. Returns the final address on success.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn write_ptr_chain(
        &mut self,
        addr: u64,
        offsets: &[i64],
        data: &[u8],
        dtype: Option<&str>,
    ) -> Result<u64> {
        let mut writer = Writer::new()
            .put_u64(tlv::tag::ADDR, addr)
            .put_offsets(tlv::tag::OFFSETS, offsets)
            .put_bytes(tlv::tag::DATA, data);
        if let Some(dtype) = dtype {
            writer = writer.put_str(tlv::tag::DTYPE, dtype);
        }
        let response = self.roundtrip(Opcode::WritePtrChain, writer.finish()).await?;
        expect_opcode(&response, Opcode::WritePtrChain)?;
        take_addr(&response)
    }

    /// `GET_MOD_BASE`: resolve a module's base address by name.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn get_mod_base(&mut self, modname: &str) -> Result<u64> {
        let payload = Writer::new().put_str(tlv::tag::MODNAME, modname).finish();
        let response = self.roundtrip(Opcode::GetModBase, payload).await?;
        expect_opcode(&response, Opcode::GetModBase)?;
        take_addr(&response)
    }
}

fn expect_opcode(response: &Frame, expected: Opcode) -> Result<()> {
    if response.header.frame_type != expected.to_u8() {
        return Err(ClientError::UnexpectedOpcode(response.header.frame_type));
    }
    Ok(())
}

fn take_data(response: &Frame) -> Result<Vec<u8>> {
    let records = tlv::decode(&response.payload);
    Ok(tlv::require_bytes(&records, tlv::tag::DATA, "DATA")?.to_vec())
}

fn take_addr(response: &Frame) -> Result<u64> {
    let records = tlv::decode(&response.payload);
    Ok(tlv::require_u64(&records, tlv::tag::ADDR, "ADDR")?)
}

#[cfg(test)]
mod tests {
    use ceqp_core::target::Arch;
    use ceqp_server::{demo::DemoTarget, server::Server};

    use super::*;

    async fn start_server(target: DemoTarget, port: u16) -> Server<DemoTarget> {
        let server = Server::new(target);
        assert!(server.start(port).await);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        server
    }

    #[tokio::test]
    async fn ping_round_trip() {
        let server = start_server(DemoTarget::new(64, Arch::X64), 31_001).await;
        let mut client = Client::connect(("127.0.0.1", 31_001)).await.unwrap();
        client.ping().await.unwrap();
        assert!(client.last_error().is_none());
        server.stop().await;
    }

    #[tokio::test]
    async fn get_mod_base_resolves_synthetic_module() {
        let server = start_server(DemoTarget::new(1024, Arch::X64), 31_002).await;
        let mut client = Client::connect(("127.0.0.1", 31_002)).await.unwrap();
        let base = client.get_mod_base("game.exe").await.unwrap();
        assert_eq!(base, DemoTarget::BASE);
        server.stop().await;
    }

    #[tokio::test]
    async fn unknown_module_surfaces_server_error_and_last_error() {
        let server = start_server(DemoTarget::new(1024, Arch::X64), 31_003).await;
        let mut client = Client::connect(("127.0.0.1", 31_003)).await.unwrap();
        let err = client.get_mod_base("nope.dll").await.unwrap_err();
        assert!(matches!(err, ClientError::Server { code: 2, .. }));
        assert!(client.last_error().unwrap().contains("2"));
        server.stop().await;
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let target = DemoTarget::new(1024, Arch::X64);
        let server = start_server(target, 31_004).await;
        let mut client = Client::connect(("127.0.0.1", 31_004)).await.unwrap();

        client.write_mem(DemoTarget::BASE + 64, &[1, 2, 3, 4]).await.unwrap();
        let data = client.read_mem(DemoTarget::BASE + 64, 4).await.unwrap();
        assert_eq!(data, vec![1, 2, 3, 4]);

        server.stop().await;
    }

    #[tokio::test]
    async fn write_ptr_chain_returns_final_address() {
        let target = DemoTarget::new(1024, Arch::X64);
        let pointer_addr = DemoTarget::BASE + 8;
        let final_addr = DemoTarget::BASE + 512;
        target.seed(pointer_addr, &final_addr.to_le_bytes());
        let server = start_server(target, 31_005).await;
        let mut client = Client::connect(("127.0.0.1", 31_005)).await.unwrap();

        let got = client.write_ptr_chain(pointer_addr, &[0], &[9, 9], None).await.unwrap();
        assert_eq!(got, final_addr);

        let data = client.read_mem(final_addr, 2).await.unwrap();
        assert_eq!(data, vec![9, 9]);

        server.stop().await;
    }
}
