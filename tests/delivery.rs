use mini_mailer::mock::{MockStream, ScriptedDialer};
use mini_mailer::{
    submit, BuildOptions, DeliveryError, DeliveryTarget, MessageError, SubmitError,
};

const PLAIN_SERVER: &[u8] = b"220 mx.example.org ESMTP\r\n\
    250 mx.example.org\r\n\
    502 STARTTLS not implemented\r\n\
    250 sender ok\r\n\
    250 recipient ok\r\n\
    354 go ahead\r\n\
    250 queued as 1234\r\n\
    221 bye\r\n";

/// Same server, reached again after a failed handshake: no STARTTLS this time.
const RECONNECT_SERVER: &[u8] = b"220 mx.example.org ESMTP\r\n\
    250 mx.example.org\r\n\
    250 sender ok\r\n\
    250 recipient ok\r\n\
    354 go ahead\r\n\
    250 queued as 1234\r\n\
    221 bye\r\n";

fn target() -> DeliveryTarget {
    DeliveryTarget::new("mx.example.org".to_string(), 587)
}

#[tokio::test]
async fn submit_with_from() {
    let mock = MockStream::with_vec(PLAIN_SERVER.to_vec());
    let transcript = mock.transcript();
    let dialer = ScriptedDialer::new(vec![mock]);

    let prepared = submit(
        "From: A <a@x.com>\nTo: B <b@y.com>\nSubject: test\n\nhello\n",
        BuildOptions::default(),
        &target(),
        &dialer,
    )
    .await
    .unwrap();

    assert_eq!(prepared.sender.address, "a@x.com");
    assert_eq!(prepared.recipient.address, "b@y.com");
    assert_eq!(dialer.targets(), vec![("mx.example.org".to_string(), 587)]);

    let sent = transcript.contents();
    assert!(sent.starts_with(
        "EHLO localhost\r\nSTARTTLS\r\nMAIL FROM:<a@x.com>\r\nRCPT TO:<b@y.com>\r\nDATA\r\n\
         From: A <a@x.com>\r\nSubject: test\r\nMessage-ID: <"
    ));
    assert!(sent.ends_with(
        "\r\nTo: B <b@y.com>\r\nUser-Agent: Mini Mailer v0.1.2\r\n\r\nhello\r\n.\r\nQUIT\r\n"
    ));
}

#[tokio::test]
async fn submit_without_from() {
    let mock = MockStream::with_vec(PLAIN_SERVER.to_vec());
    let transcript = mock.transcript();
    let dialer = ScriptedDialer::new(vec![mock]);

    submit(
        "To: c@z.com\n\nhi\n",
        BuildOptions::default(),
        &target(),
        &dialer,
    )
    .await
    .unwrap();

    let sent = transcript.contents();
    assert!(sent.contains("MAIL FROM:<bounce.me@mini.mailer.msg>\r\nRCPT TO:<c@z.com>\r\n"));
    assert!(sent.contains("DATA\r\nFrom: Mini Mailer <bounce.me@mini.mailer.msg>\r\nMessage-ID: <"));
    assert!(sent.contains("\r\nTo: c@z.com\r\nUser-Agent: Mini Mailer v0.1.2\r\n\r\nhi\r\n"));
}

#[tokio::test]
async fn missing_recipient_never_connects() {
    let dialer = ScriptedDialer::new(vec![MockStream::with_vec(PLAIN_SERVER.to_vec())]);

    let err = submit(
        "From: a@x.com\nSubject: no recipient",
        BuildOptions::default(),
        &target(),
        &dialer,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SubmitError::Message(_)));
    assert_eq!(dialer.dials(), 0);
}

#[tokio::test]
async fn failed_handshake_falls_back_to_cleartext() {
    // Accepts STARTTLS, then answers the ClientHello with plain text.
    let broken = MockStream::with_vec(
        b"220 mx.example.org ESMTP\r\n\
          250-mx.example.org\r\n\
          250 STARTTLS\r\n\
          220 ready to start TLS\r\n\
          this is not a TLS record\r\n"
            .to_vec(),
    );
    let broken_transcript = broken.transcript();
    let plain = MockStream::with_vec(RECONNECT_SERVER.to_vec());
    let plain_transcript = plain.transcript();
    let dialer = ScriptedDialer::new(vec![broken, plain]);

    submit(
        "From: a@x.com\nTo: b@y.com\n\nhello\n",
        BuildOptions::default(),
        &target(),
        &dialer,
    )
    .await
    .unwrap();

    assert_eq!(dialer.dials(), 2);
    let first = broken_transcript.contents();
    assert!(first.starts_with("EHLO localhost\r\nSTARTTLS\r\n"));
    assert!(!first.contains("MAIL FROM"));
    assert!(plain_transcript
        .contents()
        .starts_with("EHLO localhost\r\nMAIL FROM:<a@x.com>\r\nRCPT TO:<b@y.com>\r\nDATA\r\n"));
}

#[tokio::test]
async fn failed_handshake_and_failed_reconnect() {
    let broken = MockStream::with_vec(
        b"220 mx\r\n250-mx\r\n250 STARTTLS\r\n220 go\r\n".to_vec(),
    );
    let dialer = ScriptedDialer::new(vec![broken]);

    let err = submit(
        "To: b@y.com\n\nhello\n",
        BuildOptions::default(),
        &target(),
        &dialer,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        SubmitError::Delivery(DeliveryError::Connect(_))
    ));
    assert_eq!(dialer.dials(), 2);
}

#[tokio::test]
async fn extensions_are_used_when_offered() {
    let mock = MockStream::with_vec(
        b"220 mx\r\n\
          250-mx\r\n\
          250-8BITMIME\r\n\
          250-SMTPUTF8\r\n\
          250 AUTH LOGIN\r\n\
          454 TLS not available\r\n\
          334 VXNlcm5hbWU6\r\n\
          334 UGFzc3dvcmQ6\r\n\
          235 ok\r\n\
          250 ok\r\n250 ok\r\n354 go\r\n250 queued\r\n221 bye\r\n"
            .to_vec(),
    );
    let transcript = mock.transcript();
    let dialer = ScriptedDialer::new(vec![mock]);
    let mut target = target();
    target.username = "alice".to_string();
    target.password = "wonderland".to_string();

    submit(
        "To: b@y.com\n\nhello\n",
        BuildOptions { user_agent: false },
        &target,
        &dialer,
    )
    .await
    .unwrap();

    let sent = transcript.contents();
    assert!(sent.contains("STARTTLS\r\nAUTH LOGIN\r\nYWxpY2U=\r\nd29uZGVybGFuZA==\r\n"));
    assert!(sent.contains("MAIL FROM:<bounce.me@mini.mailer.msg> BODY=8BITMIME SMTPUTF8\r\n"));
    assert!(!sent.contains("User-Agent"));
}

#[tokio::test]
async fn authentication_without_advertised_mechanism() {
    let mock = MockStream::with_vec(
        b"220 mx\r\n\
          250 mx\r\n\
          502 not implemented\r\n\
          235 ok\r\n\
          250 ok\r\n250 ok\r\n354 go\r\n250 queued\r\n221 bye\r\n"
            .to_vec(),
    );
    let transcript = mock.transcript();
    let dialer = ScriptedDialer::new(vec![mock]);
    let mut target = target();
    target.username = "u".to_string();
    target.password = "p".to_string();

    submit("To: b@y.com\n\nhello\n", BuildOptions::default(), &target, &dialer)
        .await
        .unwrap();

    assert!(transcript
        .contents()
        .starts_with("EHLO localhost\r\nSTARTTLS\r\nAUTH PLAIN AHUAcA==\r\nMAIL FROM:"));
}

#[tokio::test]
async fn invalid_envelope_never_connects() {
    let dialer = ScriptedDialer::new(vec![MockStream::with_vec(PLAIN_SERVER.to_vec())]);

    let err = submit(
        "From: a@x.com\nTo: Nobody <>\n\nhello\n",
        BuildOptions::default(),
        &target(),
        &dialer,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        SubmitError::Message(MessageError::InvalidRecipient(_))
    ));
    assert_eq!(dialer.dials(), 0);
}
