use std::{
    net::Ipv4Addr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use anyhow::{Context, Result};
use rand::Rng;
use tokio::{
    io::AsyncReadExt,
    net::{tcp::OwnedReadHalf, TcpListener},
};
use tracing::{debug, event, instrument, Level};

use runeward_game::{accounts::AccountService, characters::CharacterService};
use runeward_protocol::world::CLIENT_HEADER_LEN;

use crate::{
    client::ClientId,
    world::{Session, World, WorldState},
};

/// The world listener: accepts sockets, hands each one a session and a
/// dedicated dispatch task.
pub struct WorldServer<A, C> {
    pub world: Arc<World<A, C>>,
    next_client: AtomicU64,
}

impl<A, C> WorldServer<A, C>
where
    A: AccountService + 'static,
    C: CharacterService + 'static,
{
    pub fn new(world: Arc<World<A, C>>) -> Self {
        Self {
            world,
            next_client: AtomicU64::new(1),
        }
    }

    #[instrument(skip(self))]
    pub async fn accept_clients(&self, host: Ipv4Addr, port: u16) -> Result<()> {
        let listener = TcpListener::bind((host, port))
            .await
            .with_context(|| format!("could not bind world port {port}"))?;
        event!(Level::INFO, "listening on {host}:{port}");

        loop {
            let (stream, peer) = listener.accept().await?;
            let client_id = ClientId(self.next_client.fetch_add(1, Ordering::Relaxed));
            debug!("accepted {peer} as {client_id:?}");

            let (reader, writer) = stream.into_split();
            let session = Arc::new(Session::new(
                client_id,
                writer,
                rand::thread_rng().gen(),
            ));
            self.world.add_session(session.clone()).await;

            let world = self.world.clone();
            tokio::spawn(async move {
                if let Err(e) = connection_loop(&world, &session, reader).await {
                    debug!("connection {client_id:?} ended: {e}");
                }
                world.teardown(&session).await;
            });
        }
    }
}

/// Per-connection dispatch: packets are read and handled strictly in
/// arrival order; a handler completes (including its writes) before the
/// next inbound packet is read.
async fn connection_loop<A: AccountService, C: CharacterService>(
    world: &World<A, C>,
    session: &Arc<Session>,
    mut reader: OwnedReadHalf,
) -> Result<()> {
    world.send_auth_challenge(session).await?;

    while session.state().await != WorldState::Closed {
        let mut header = [0u8; CLIENT_HEADER_LEN];
        if reader.read_exact(&mut header).await.is_err() {
            // Peer hung up between packets.
            break;
        }
        let (opcode, body_len) = session.decode_header(&mut header).await?;

        let mut body = vec![0u8; body_len];
        reader
            .read_exact(&mut body)
            .await
            .context("connection closed mid-packet")?;

        world.handle_packet(session, opcode, &body).await?;
    }

    Ok(())
}
