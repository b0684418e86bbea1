//! IRC transport.
//!
//! Registers with the server, joins the tracked channel and turns `TOPIC`
//! lines into bridge events. Outgoing commands go through a channel to the
//! session task that owns the socket.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::common::error::{CommandError, ConnectError};
use crate::common::messages::TransportEvent;
use crate::common::transport::{EventSender, Transport};
use crate::common::types::{ChannelRef, Side};
use crate::config::types::IrcConfig;

use super::codec::{new_irc_connection, topic_capacity, IrcConnection, IrcMessage};

/// Time allowed for TCP connect plus registration.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// How often the session checks the link.
const PING_INTERVAL: Duration = Duration::from_secs(60);

/// Silence after which the link is considered dead.
const STALE_AFTER: Duration = Duration::from_secs(240);

pub struct IrcTransport {
    config: IrcConfig,
    outbound: Mutex<Option<mpsc::UnboundedSender<IrcMessage>>>,
    /// TOPICLEN advertised by the server, 0 until known.
    topic_len: Arc<AtomicUsize>,
}

impl IrcTransport {
    pub fn new(config: IrcConfig) -> Self {
        Self {
            config,
            outbound: Mutex::new(None),
            topic_len: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn send(&self, message: IrcMessage) -> Result<(), CommandError> {
        let outbound = self.outbound.lock().map_err(|e| CommandError::Failed {
            message: e.to_string(),
        })?;
        match outbound.as_ref() {
            Some(tx) => tx.send(message).map_err(|_| CommandError::NotConnected),
            None => Err(CommandError::NotConnected),
        }
    }
}

#[async_trait]
impl Transport for IrcTransport {
    fn side(&self) -> Side {
        Side::Irc
    }

    async fn connect(&self, events: EventSender) -> Result<(), ConnectError> {
        let address = format!("{}:{}", self.config.server, self.config.port);
        info!("Connecting to IRC server at {}", address);

        let mut connection = timeout(HANDSHAKE_TIMEOUT, async {
            let stream = TcpStream::connect(&address)
                .await
                .map_err(|e| ConnectError::ConnectFailed {
                    address: address.clone(),
                    source: e,
                })?;
            Ok::<_, ConnectError>(new_irc_connection(stream))
        })
        .await
        .map_err(|_| ConnectError::Timeout)??;

        let nick = timeout(HANDSHAKE_TIMEOUT, register(&mut connection, &self.config))
            .await
            .map_err(|_| ConnectError::Timeout)??;
        info!(%nick, "Connected to IRC server");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        if let Ok(mut outbound) = self.outbound.lock() {
            *outbound = Some(outbound_tx);
        }

        let session = IrcSession::new(&self.config, nick, events, outbound_rx)
            .with_topic_len(self.topic_len.clone());
        tokio::spawn(session.run(connection));
        Ok(())
    }

    fn topic_limit(&self, channel: &ChannelRef) -> Option<usize> {
        let capacity = topic_capacity(channel.as_str());
        match self.topic_len.load(Ordering::Relaxed) {
            0 => Some(capacity),
            advertised => Some(advertised.min(capacity)),
        }
    }

    async fn set_topic(&self, channel: &ChannelRef, text: &str) -> Result<(), CommandError> {
        self.send(IrcMessage::topic(channel.as_str(), text))
    }

    async fn send_notice(&self, channel: &ChannelRef, text: &str) -> Result<(), CommandError> {
        self.send(IrcMessage::notice(channel.as_str(), text))
    }

    async fn close(&self) {
        // Dropping the sender makes the session quit
        if let Ok(mut outbound) = self.outbound.lock() {
            outbound.take();
        }
    }
}

/// Run the registration handshake. Returns the nick the server accepted.
pub async fn register<S>(
    connection: &mut IrcConnection<S>,
    config: &IrcConfig,
) -> Result<String, ConnectError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Some(password) = &config.password {
        connection.send(IrcMessage::pass(password)).await?;
    }
    let mut nick = config.nick.clone();
    connection.send(IrcMessage::nick(&nick)).await?;
    connection
        .send(IrcMessage::user(&config.user, &config.name))
        .await?;

    while let Some(message) = connection.next().await {
        let message = message?;
        match message.command.as_str() {
            "PING" => {
                connection
                    .send(IrcMessage::pong(message.trailing().unwrap_or_default()))
                    .await?;
            }
            // RPL_WELCOME
            "001" => {
                return Ok(message.param(0).map(String::from).unwrap_or(nick));
            }
            // ERR_NICKNAMEINUSE
            "433" => {
                nick.push('_');
                warn!("IRC nickname in use, trying {}", nick);
                connection.send(IrcMessage::nick(&nick)).await?;
            }
            // ERR_ERRONEUSNICKNAME
            "432" => {
                return Err(ConnectError::AuthFailed {
                    reason: format!("nickname '{}' rejected", nick),
                });
            }
            // ERR_PASSWDMISMATCH
            "464" => {
                return Err(ConnectError::AuthFailed {
                    reason: "server password incorrect".to_string(),
                });
            }
            "ERROR" => {
                return Err(ConnectError::AuthFailed {
                    reason: message.trailing().unwrap_or("closing link").to_string(),
                });
            }
            _ => debug!("IRC registration: {}", message.to_line()),
        }
    }

    Err(ConnectError::ConnectionClosed)
}

/// A registered IRC session.
struct IrcSession {
    channel: ChannelRef,
    nick: String,
    usermode: Option<String>,
    auth: Option<(String, String)>,
    events: EventSender,
    outbound_rx: mpsc::UnboundedReceiver<IrcMessage>,
    last_activity: Instant,
    topic_len: Arc<AtomicUsize>,
}

impl IrcSession {
    fn new(
        config: &IrcConfig,
        nick: String,
        events: EventSender,
        outbound_rx: mpsc::UnboundedReceiver<IrcMessage>,
    ) -> Self {
        Self {
            channel: ChannelRef::new(config.channel.clone()),
            nick,
            usermode: config.usermode.clone(),
            auth: config
                .auth
                .as_ref()
                .map(|auth| (auth.bot.clone(), auth.command.clone())),
            events,
            outbound_rx,
            last_activity: Instant::now(),
            topic_len: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_topic_len(mut self, topic_len: Arc<AtomicUsize>) -> Self {
        self.topic_len = topic_len;
        self
    }

    async fn run<S>(mut self, mut connection: IrcConnection<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let reason = match self.handle_connection(&mut connection).await {
            Ok(reason) => reason,
            Err(e) => {
                error!("IRC session error: {}", e);
                e.to_string()
            }
        };
        info!(%reason, "IRC session ended");
        let _ = self.events.send(TransportEvent::Disconnected { reason });
    }

    async fn handle_connection<S>(
        &mut self,
        connection: &mut IrcConnection<S>,
    ) -> std::io::Result<String>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if let Some((bot, command)) = &self.auth {
            info!("Authing with IRC bot {}", bot);
            connection.send(IrcMessage::privmsg(bot, command)).await?;
        }
        if let Some(usermode) = &self.usermode {
            info!("Setting usermode(s) {}", usermode);
            connection
                .send(IrcMessage::mode(&self.nick, usermode))
                .await?;
        }
        info!(channel = %self.channel, "Joining IRC channel");
        connection
            .send(IrcMessage::join(self.channel.as_str()))
            .await?;

        let mut ping_interval =
            tokio::time::interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = connection.next() => {
                    match message {
                        Some(Ok(message)) => {
                            self.last_activity = Instant::now();
                            if let Some(reason) = self.handle_message(connection, message).await? {
                                return Ok(reason);
                            }
                        }
                        Some(Err(e)) => return Err(e),
                        None => return Ok("connection closed by server".to_string()),
                    }
                }

                outgoing = self.outbound_rx.recv() => {
                    match outgoing {
                        Some(message) => {
                            debug!("IRC -> {}", message.to_line());
                            connection.send(message).await?;
                        }
                        None => {
                            connection.send(IrcMessage::quit("Shutting down")).await?;
                            return Ok("closed".to_string());
                        }
                    }
                }

                _ = ping_interval.tick() => {
                    if self.last_activity.elapsed() > STALE_AFTER {
                        return Ok("ping timeout".to_string());
                    }
                    connection.send(IrcMessage::ping("topicsync")).await?;
                }
            }
        }
    }

    /// Handle one server message. Returns a reason when the session must end.
    async fn handle_message<S>(
        &mut self,
        connection: &mut IrcConnection<S>,
        message: IrcMessage,
    ) -> std::io::Result<Option<String>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let from_self = message.source_nick() == Some(self.nick.as_str());

        match message.command.as_str() {
            "PING" => {
                connection
                    .send(IrcMessage::pong(message.trailing().unwrap_or_default()))
                    .await?;
            }
            "JOIN" if from_self => {
                let joined = message.param(0).map(ChannelRef::from);
                if joined.as_ref() == Some(&self.channel) {
                    info!("IRC is connected and ready to go!");
                    self.emit(TransportEvent::Ready);
                }
            }
            "TOPIC" => {
                if let (Some(channel), Some(text)) = (message.param(0), message.param(1)) {
                    info!(%channel, "Topic changed in IRC channel");
                    self.emit(TransportEvent::TopicChanged {
                        channel: ChannelRef::from(channel),
                        text: text.to_string(),
                        actor: message.source_nick().map(String::from),
                    });
                }
            }
            "NICK" if from_self => {
                if let Some(nick) = message.param(0) {
                    info!("IRC nick changed to {}", nick);
                    self.nick = nick.to_string();
                }
            }
            "KICK" => {
                let kicked = message.param(1) == Some(self.nick.as_str());
                let channel = message.param(0).map(ChannelRef::from);
                if kicked && channel.as_ref() == Some(&self.channel) {
                    warn!(channel = %self.channel, "Kicked from IRC channel, rejoining");
                    connection
                        .send(IrcMessage::join(self.channel.as_str()))
                        .await?;
                }
            }
            // RPL_ISUPPORT
            "005" => {
                let advertised = message
                    .params
                    .iter()
                    .find_map(|token| token.strip_prefix("TOPICLEN="))
                    .and_then(|len| len.parse::<usize>().ok());
                if let Some(len) = advertised {
                    debug!("IRC server TOPICLEN is {}", len);
                    self.topic_len.store(len, Ordering::Relaxed);
                }
            }
            // ERR_NOSUCHCHANNEL, ERR_TOOMANYCHANNELS, ERR_CHANNELISFULL,
            // ERR_INVITEONLYCHAN, ERR_BANNEDFROMCHAN, ERR_BADCHANNELKEY
            "403" | "405" | "471" | "473" | "474" | "475"
                if message.param(1).map(ChannelRef::from).as_ref() == Some(&self.channel) =>
            {
                let reason = message.trailing().unwrap_or("join rejected");
                error!(
                    channel = %self.channel,
                    code = %message.command,
                    "Cannot join IRC channel: {}",
                    reason
                );
                return Ok(Some(format!("cannot join {}: {}", self.channel, reason)));
            }
            // ERR_NOSUCHCHANNEL, ERR_NOTONCHANNEL, ERR_CHANOPRIVSNEEDED
            "403" | "442" | "482" => {
                warn!(
                    "IRC rejected command: {}",
                    message.trailing().unwrap_or(&message.command)
                );
            }
            "ERROR" => {
                return Ok(Some(
                    message.trailing().unwrap_or("server error").to_string(),
                ));
            }
            _ => {}
        }
        Ok(None)
    }

    fn emit(&self, event: TransportEvent) {
        if let Err(e) = self.events.send(event) {
            debug!("IRC event receiver gone: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::IrcAuthConfig;
    use tokio::io::duplex;

    fn test_config() -> IrcConfig {
        IrcConfig {
            server: "localhost".to_string(),
            port: 6667,
            nick: "TopicBot".to_string(),
            user: "topic".to_string(),
            name: "A Topic Sync Bot".to_string(),
            password: None,
            channel: "#general".to_string(),
            usermode: None,
            auth: None,
        }
    }

    async fn expect(server: &mut IrcConnection<tokio::io::DuplexStream>, line: &str) {
        let message = server.next().await.unwrap().unwrap();
        assert_eq!(message.to_line(), line);
    }

    async fn reply(server: &mut IrcConnection<tokio::io::DuplexStream>, line: &str) {
        server.send(IrcMessage::parse(line).unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn test_register_answers_ping_and_retries_nick() {
        let (client_io, server_io) = duplex(4096);
        let mut client = new_irc_connection(client_io);
        let mut server = new_irc_connection(server_io);
        let mut config = test_config();
        config.password = Some("secret".to_string());

        let handshake = tokio::spawn(async move { register(&mut client, &config).await });

        expect(&mut server, "PASS secret").await;
        expect(&mut server, "NICK TopicBot").await;
        expect(&mut server, "USER topic 0 * :A Topic Sync Bot").await;
        reply(&mut server, "PING :abc").await;
        expect(&mut server, "PONG abc").await;
        reply(&mut server, ":irc 433 * TopicBot :Nickname is already in use").await;
        expect(&mut server, "NICK TopicBot_").await;
        reply(&mut server, ":irc 001 TopicBot_ :Welcome").await;

        let nick = tokio_test::assert_ok!(handshake.await.unwrap());
        assert_eq!(nick, "TopicBot_");
    }

    #[tokio::test]
    async fn test_register_bad_password_fails() {
        let (client_io, server_io) = duplex(4096);
        let mut client = new_irc_connection(client_io);
        let mut server = new_irc_connection(server_io);
        let config = test_config();

        let handshake = tokio::spawn(async move { register(&mut client, &config).await });
        expect(&mut server, "NICK TopicBot").await;
        expect(&mut server, "USER topic 0 * :A Topic Sync Bot").await;
        reply(&mut server, ":irc 464 * :Password incorrect").await;

        assert!(matches!(
            handshake.await.unwrap(),
            Err(ConnectError::AuthFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_register_closed_connection_fails() {
        let (client_io, server_io) = duplex(4096);
        let mut client = new_irc_connection(client_io);
        drop(server_io);

        tokio_test::assert_err!(register(&mut client, &test_config()).await);
    }

    #[tokio::test]
    async fn test_session_emits_ready_and_topics() {
        let (client_io, server_io) = duplex(4096);
        let mut server = new_irc_connection(server_io);
        let mut config = test_config();
        config.usermode = Some("+B".to_string());
        config.auth = Some(IrcAuthConfig {
            bot: "NickServ".to_string(),
            command: "IDENTIFY hunter2".to_string(),
        });

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let session = IrcSession::new(&config, "TopicBot".to_string(), events_tx, outbound_rx);
        let task = tokio::spawn(session.run(new_irc_connection(client_io)));

        expect(&mut server, "PRIVMSG NickServ :IDENTIFY hunter2").await;
        expect(&mut server, "MODE TopicBot +B").await;
        expect(&mut server, "JOIN #general").await;

        // Someone else joining is not our readiness
        reply(&mut server, ":alice!a@h JOIN #general").await;
        reply(&mut server, ":TopicBot!t@h JOIN #General").await;
        assert_eq!(events_rx.recv().await.unwrap(), TransportEvent::Ready);

        reply(&mut server, ":alice!a@h TOPIC #general :Release day").await;
        assert_eq!(
            events_rx.recv().await.unwrap(),
            TransportEvent::TopicChanged {
                channel: ChannelRef::from("#general"),
                text: "Release day".to_string(),
                actor: Some("alice".to_string()),
            }
        );

        outbound_tx
            .send(IrcMessage::topic("#general", "From Discord"))
            .unwrap();
        expect(&mut server, "TOPIC #general :From Discord").await;

        // Closing the outbound side quits the session
        drop(outbound_tx);
        expect(&mut server, "QUIT :Shutting down").await;
        task.await.unwrap();
        assert!(matches!(
            events_rx.recv().await.unwrap(),
            TransportEvent::Disconnected { .. }
        ));
    }

    #[tokio::test]
    async fn test_session_reports_server_close() {
        let (client_io, server_io) = duplex(4096);
        let mut server = new_irc_connection(server_io);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (_outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let session =
            IrcSession::new(&test_config(), "TopicBot".to_string(), events_tx, outbound_rx);
        let task = tokio::spawn(session.run(new_irc_connection(client_io)));

        expect(&mut server, "JOIN #general").await;
        reply(&mut server, "ERROR :Closing Link: ping timeout").await;
        task.await.unwrap();

        assert_eq!(
            events_rx.recv().await.unwrap(),
            TransportEvent::Disconnected {
                reason: "Closing Link: ping timeout".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_session_ends_when_join_is_rejected() {
        let (client_io, server_io) = duplex(4096);
        let mut server = new_irc_connection(server_io);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (_outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let session =
            IrcSession::new(&test_config(), "TopicBot".to_string(), events_tx, outbound_rx);
        let task = tokio::spawn(session.run(new_irc_connection(client_io)));

        expect(&mut server, "JOIN #general").await;
        // Rejections for other channels are not fatal
        reply(&mut server, ":irc 474 TopicBot #other :Cannot join channel (+b)").await;
        reply(&mut server, ":irc 474 TopicBot #General :Cannot join channel (+b)").await;
        task.await.unwrap();

        assert_eq!(
            events_rx.recv().await.unwrap(),
            TransportEvent::Disconnected {
                reason: "cannot join #general: Cannot join channel (+b)".to_string()
            }
        );
        assert!(events_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_session_records_advertised_topic_length() {
        let (client_io, server_io) = duplex(4096);
        let mut server = new_irc_connection(server_io);
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let topic_len = Arc::new(AtomicUsize::new(0));
        let session =
            IrcSession::new(&test_config(), "TopicBot".to_string(), events_tx, outbound_rx)
                .with_topic_len(topic_len.clone());
        let task = tokio::spawn(session.run(new_irc_connection(client_io)));

        expect(&mut server, "JOIN #general").await;
        reply(
            &mut server,
            ":irc 005 TopicBot CHANTYPES=# TOPICLEN=307 NICKLEN=30 :are supported by this server",
        )
        .await;
        reply(&mut server, "PING :sync").await;
        expect(&mut server, "PONG sync").await;
        assert_eq!(topic_len.load(Ordering::Relaxed), 307);

        drop(outbound_tx);
        expect(&mut server, "QUIT :Shutting down").await;
        task.await.unwrap();
    }

    #[test]
    fn test_topic_limit_uses_smaller_of_line_and_topiclen() {
        let transport = IrcTransport::new(test_config());
        let channel = ChannelRef::from("#general");
        assert_eq!(
            transport.topic_limit(&channel),
            Some(topic_capacity("#general"))
        );

        transport.topic_len.store(300, Ordering::Relaxed);
        assert_eq!(transport.topic_limit(&channel), Some(300));

        transport.topic_len.store(5000, Ordering::Relaxed);
        assert_eq!(
            transport.topic_limit(&channel),
            Some(topic_capacity("#general"))
        );
    }

    #[tokio::test]
    async fn test_commands_fail_when_not_connected() {
        let transport = IrcTransport::new(test_config());
        let result = transport
            .set_topic(&ChannelRef::from("#general"), "hello")
            .await;
        assert!(matches!(result, Err(CommandError::NotConnected)));
    }
}
