//! End-to-end tests over the stub transport and suppressed mailers

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use ezmail::{
    message::{Attachment, Message},
    observer::DispatchObserver,
    transport::stub::StubTransport,
    Error, MailSession, Mailer,
};

fn plain_message() -> Message {
    Message::builder()
        .subject("integration")
        .recipient("to@example.com")
        .sender("from@example.com")
        .body("hello")
        .build()
}

#[test]
fn suppressed_mailer_round_trip() {
    let mailer = Mailer::builder("smtp.example.com")
        .suppress(true)
        .default_sender("noreply@example.com")
        .build();
    let outbox = mailer.record_messages();

    let sent = mailer
        .send_message(
            Message::builder()
                .subject("Report")
                .recipient("boss@example.com")
                .cc("peer@example.com")
                .body("Find the report attached.")
                .html("<p>Find the report <b>attached</b>.</p>")
                .attachment(
                    Attachment::new("application/pdf", b"%PDF-1.4".to_vec())
                        .filename("report.pdf"),
                ),
        )
        .unwrap();

    // the default sender and a timestamp were filled in during the send
    assert_eq!(sent.sender(), Some("noreply@example.com"));
    assert!(sent.date().is_some());

    assert_eq!(outbox.len(), 1);
    let recorded = &outbox.messages()[0];
    assert_eq!(recorded.subject(), "Report");

    let rendered = recorded.as_string().unwrap();
    assert!(rendered.contains("multipart/mixed"));
    assert!(rendered.contains("multipart/alternative"));
    assert!(rendered.contains("Content-Disposition: attachment; filename=\"report.pdf\"\r\n"));
    assert!(rendered.contains("Cc: peer@example.com\r\n"));
}

#[test]
fn suppressed_mailer_still_validates() {
    let mailer = Mailer::builder("smtp.example.com")
        .suppress(true)
        .default_sender("noreply@example.com")
        .build();
    let outbox = mailer.record_messages();

    let mut no_recipients = Message::builder().subject("empty").build();
    assert!(matches!(
        mailer.send(&mut no_recipients),
        Err(Error::MissingRecipients)
    ));

    let mut injected = Message::builder()
        .subject("hi\r\nBcc: sneak@example.com")
        .recipient("to@example.com")
        .build();
    assert!(matches!(mailer.send(&mut injected), Err(Error::BadHeader(_))));

    assert!(outbox.is_empty());
}

#[test]
fn suppressed_mailer_without_default_sender_needs_one() {
    let mailer = Mailer::builder("smtp.example.com").suppress(true).build();

    let mut message = Message::builder().recipient("to@example.com").build();
    assert!(matches!(
        mailer.send(&mut message),
        Err(Error::MissingSender)
    ));
}

#[test]
fn bcc_reaches_the_envelope_but_not_the_headers() {
    let transport = StubTransport::new();
    let mut session = MailSession::open(
        transport.clone(),
        None,
        None,
        false,
        DispatchObserver::new(),
    )
    .unwrap();

    let mut message = Message::builder()
        .subject("quiet copy")
        .recipient("to@example.com")
        .bcc("hidden@example.com")
        .sender("from@example.com")
        .body("hello")
        .build();
    session.send(&mut message).unwrap();

    let sent = transport.messages();
    let envelope_recipients: Vec<_> = sent[0].0.to().iter().map(|a| a.as_ref()).collect();
    assert_eq!(envelope_recipients, ["to@example.com", "hidden@example.com"]);

    let rendered = String::from_utf8_lossy(&sent[0].1).into_owned();
    assert!(rendered.contains("To: to@example.com\r\n"));
    assert!(!rendered.contains("hidden@example.com"));
}

#[test]
fn quota_recycling_survives_a_long_run() {
    let transport = StubTransport::new();
    let mut session = MailSession::open(
        transport.clone(),
        Some(3),
        None,
        false,
        DispatchObserver::new(),
    )
    .unwrap();

    for _ in 0..10 {
        let mut message = plain_message();
        session.send(&mut message).unwrap();
    }

    // 10 sends with a quota of 3 recycle after sends 3, 6 and 9
    assert_eq!(transport.messages().len(), 10);
    assert_eq!(transport.closes(), 3);
    assert_eq!(transport.opens(), 4);

    session.close().unwrap();
    assert_eq!(transport.closes(), 4);
}

#[test]
fn listeners_run_in_order_and_unsubscribe_on_drop() {
    let observer = DispatchObserver::new();
    let mailer = Mailer::builder("smtp.example.com")
        .suppress(true)
        .observer(observer.clone())
        .build();

    let counter = Arc::new(AtomicUsize::new(0));
    let subscription = {
        let counter = Arc::clone(&counter);
        observer.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    };

    mailer.send(&mut plain_message()).unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    drop(subscription);
    mailer.send(&mut plain_message()).unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn session_scope_owns_the_connection() {
    let transport = StubTransport::new();

    {
        let mut session = MailSession::open(
            transport.clone(),
            None,
            None,
            false,
            DispatchObserver::new(),
        )
        .unwrap();
        session.send(&mut plain_message()).unwrap();
        // session dropped here without an explicit close
    }

    assert_eq!(transport.opens(), 1);
    assert_eq!(transport.closes(), 1);
    assert_eq!(transport.messages().len(), 1);
}
