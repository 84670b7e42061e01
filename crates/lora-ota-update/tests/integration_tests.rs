//! End-to-end session tests: an agent wired to mock collaborators, fed
//! the frames an update server would send.

use std::time::Duration;

use lora_ota_test_helpers::fixtures::TEST_NWK_KEY;
use lora_ota_test_helpers::prelude::*;
use lora_ota_update::prelude::*;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn agent_for(root: &DeviceRoot, version: &str) -> MockAgent {
    mock_agent(AgentConfig::with_root(root.path()), version)
}

fn feed(agent: &mut MockAgent, frames: &[Vec<u8>]) -> Vec<HandleOutcome> {
    frames.iter().map(|f| agent.handle_frame(f)).collect()
}

fn negotiated(root: &DeviceRoot) -> MockAgent {
    let mut agent = agent_for(root, "1.0.0");
    feed(&mut agent, &ServerScript::negotiation("1.0.1"));
    assert_eq!(agent.session().state(), SessionState::Receiving);
    agent
}

mod negotiation {
    use super::*;

    #[test]
    fn test_newer_version_starts_session_and_replies() {
        let root = DeviceRoot::new();
        let mut agent = agent_for(&root, "1.0.0");

        let outcome = agent.handle_frame(&ServerScript::update_info("1.0.1", 1_700_000_000));
        assert_eq!(outcome, HandleOutcome::Processed);
        assert_eq!(agent.session().state(), SessionState::Negotiating);
        assert!(agent.update_in_progress());
        assert!(agent.watchdog().is_armed());
        assert_eq!(
            agent.session().target_version().map(FirmwareVersion::as_str),
            Some("1.0.1")
        );
        assert_eq!(
            agent.transport().last_message(),
            Some(Message::UpdateInfoReply {
                version: "1.0.0".into()
            })
        );
    }

    #[test]
    fn test_same_or_older_version_still_gets_reply() {
        let root = DeviceRoot::new();
        let mut agent = agent_for(&root, "1.10.0");

        for offered in ["1.10.0", "1.2.0", "0.9"] {
            agent.handle_frame(&ServerScript::update_info(offered, 1_700_000_000));
            assert_eq!(agent.session().state(), SessionState::Idle);
        }
        assert_eq!(agent.transport().sent.len(), 3);
        assert!(!agent.watchdog().is_armed());
    }

    #[test]
    fn test_unparseable_version_means_no_update() {
        let root = DeviceRoot::new();
        let mut agent = agent_for(&root, "1.0.0");

        let outcome = agent.handle_frame(&ServerScript::update_info("1.x", 1_700_000_000));
        assert_eq!(outcome, HandleOutcome::Processed);
        assert_eq!(agent.session().state(), SessionState::Idle);
        assert_eq!(agent.transport().sent.len(), 1);
    }

    #[test]
    fn test_stale_clock_is_synchronized() -> TestResult {
        let root = DeviceRoot::new();
        let mut agent = OtaAgent::new(
            AgentConfig::with_root(root.path()),
            FirmwareVersion::parse("1.0.0")?,
            MockTransport::new(),
            MockReboot::new(),
            MockClock::at(0),
        )?;

        agent.handle_frame(&ServerScript::update_info("1.0.0", 1_674_930_013));
        assert_eq!(agent.clock().now, 1_674_930_013);
        Ok(())
    }

    #[test]
    fn test_plausible_clock_is_left_alone() {
        let root = DeviceRoot::new();
        let mut agent = agent_for(&root, "1.0.0");
        agent.handle_frame(&ServerScript::update_info("1.0.1", 1_800_000_000));
        assert!(agent.clock().set_calls.is_empty());
    }

    #[test]
    fn test_clock_failure_is_not_fatal() -> TestResult {
        let root = DeviceRoot::new();
        let mut clock = MockClock::at(0);
        clock.fail_set = true;
        let mut agent = OtaAgent::new(
            AgentConfig::with_root(root.path()),
            FirmwareVersion::parse("1.0.0")?,
            MockTransport::new(),
            MockReboot::new(),
            clock,
        )?;

        let outcome = agent.handle_frame(&ServerScript::update_info("1.0.1", 1_674_930_013));
        assert_eq!(outcome, HandleOutcome::Processed);
        assert_eq!(agent.session().state(), SessionState::Negotiating);
        assert_eq!(agent.clock().set_calls, vec![1_674_930_013]);
        Ok(())
    }

    #[test]
    fn test_multicast_key_switches_group_and_acks() {
        let root = DeviceRoot::new();
        let agent = negotiated(&root);

        let creds = agent.transport().multicast.as_ref().map(|c| c.address);
        assert_eq!(creds, Some(0x2601_1bda));
        assert_eq!(agent.transport().last_message(), Some(Message::Listening));
        assert!(agent.session().multicast().is_some());
    }

    #[test]
    fn test_empty_multicast_key_aborts() {
        let root = DeviceRoot::new();
        let mut agent = agent_for(&root, "1.0.0");
        agent.handle_frame(&ServerScript::update_info("2.0", 1_700_000_000));

        assert_eq!(
            agent.handle_frame(&ServerScript::no_multicast_key()),
            HandleOutcome::Aborted
        );
        assert_eq!(agent.session().state(), SessionState::Idle);
        assert!(!agent.watchdog().is_armed());
        assert_eq!(agent.reboot_handle().count(), 0);
    }

    #[test]
    fn test_multicast_failure_aborts() -> TestResult {
        let root = DeviceRoot::new();
        let mut transport = MockTransport::new();
        transport.fail_multicast = true;
        let mut agent = OtaAgent::new(
            AgentConfig::with_root(root.path()),
            FirmwareVersion::parse("1.0.0")?,
            transport,
            MockReboot::new(),
            MockClock::at(1_700_000_000),
        )?;

        agent.handle_frame(&ServerScript::update_info("2.0", 1_700_000_000));
        assert_eq!(
            agent.handle_frame(&ServerScript::multicast_key()),
            HandleOutcome::Aborted
        );
        assert_eq!(agent.session().state(), SessionState::Idle);
        assert!(!agent.watchdog().is_armed());
        Ok(())
    }

    #[test]
    fn test_malformed_credentials_abort() {
        let root = DeviceRoot::new();
        let mut agent = agent_for(&root, "1.0.0");
        agent.handle_frame(&ServerScript::update_info("2.0", 1_700_000_000));

        let frame = format!("$OTA,3,26011bda,{TEST_NWK_KEY},0011,*");
        assert_eq!(agent.handle_frame(frame.as_bytes()), HandleOutcome::Aborted);
        assert_eq!(agent.transport().multicast, None);
    }
}

mod receiving {
    use super::*;

    #[test]
    fn test_cfg_update_commits() {
        let root = DeviceRoot::with_files(&[("cfg.py", "a")]);
        let mut agent = negotiated(&root);

        agent.handle_frame(&ServerScript::filename("cfg.py"));
        assert_eq!(agent.session().manifest().counters().updated, 1);

        let patch_text = "@@ -1,1 +1,1 @@\n-a\n+b\n";
        let fragments = ServerScript::patch_fragments(patch_text, 2);
        assert_eq!(fragments.len(), 2);
        for outcome in feed(&mut agent, &fragments) {
            assert_eq!(outcome, HandleOutcome::Processed);
        }
        agent.handle_frame(&ServerScript::checksum_for(patch_text));
        assert_eq!(
            agent.session().verified_patches().get("cfg.py").map(String::as_str),
            Some(patch_text)
        );

        let outcome = agent.handle_frame(&ServerScript::manifest(0, 1, 0));
        assert_eq!(outcome, HandleOutcome::Committed);
        assert_eq!(root.read("cfg.py").as_deref(), Some("b"));
        assert!(root.artifacts().is_empty());
        assert_eq!(agent.reboot_handle().committed(), 1);
        assert_eq!(agent.session().state(), SessionState::Idle);
        assert!(!agent.watchdog().is_armed());
    }

    #[test]
    fn test_new_update_and_delete_in_one_session() {
        let root = DeviceRoot::with_files(&[
            ("main.py", "print('v1')\n"),
            ("old.py", "legacy\n"),
            ("version.py", "1.0.0\n"),
        ]);
        let mut agent = negotiated(&root);

        feed(
            &mut agent,
            &ServerScript::file_transfer("main.py", "print('v1')\n", "print('v2')\n", 3),
        );
        feed(
            &mut agent,
            &ServerScript::file_transfer("lib/util.py", "", "def f():\n    return 1\n", 1),
        );
        feed(
            &mut agent,
            &ServerScript::file_transfer("version.py", "1.0.0\n", "1.0.1\n", 1),
        );
        agent.handle_frame(&ServerScript::delete_file("old.py"));
        assert!(root.exists("old.py.bak"));

        let outcome = agent.handle_frame(&ServerScript::manifest(1, 2, 1));
        assert_eq!(outcome, HandleOutcome::Committed);
        assert_eq!(root.read("main.py").as_deref(), Some("print('v2')\n"));
        assert_eq!(
            root.read("lib/util.py").as_deref(),
            Some("def f():\n    return 1\n")
        );
        assert_eq!(root.read("version.py").as_deref(), Some("1.0.1\n"));
        assert!(!root.exists("old.py"));
        assert!(root.artifacts().is_empty());
        assert_eq!(
            agent.reboot_handle().reasons,
            vec![RebootReason::Committed {
                version: "1.0.1".into()
            }]
        );
    }

    #[test]
    fn test_patch_without_filename_is_dropped() {
        let root = DeviceRoot::new();
        let mut agent = negotiated(&root);

        let outcome = agent.handle_frame(&ServerScript::patch(b"\x78\x9c\x01"));
        assert_eq!(outcome, HandleOutcome::Dropped);
        assert_eq!(agent.session().file_to_patch(), None);
        assert!(agent.session().verified_patches().is_empty());
        assert!(!agent.session().checksum_failed());
        assert_eq!(agent.session().state(), SessionState::Receiving);
    }

    #[test]
    fn test_checksum_without_filename_is_dropped() {
        let root = DeviceRoot::new();
        let mut agent = negotiated(&root);
        let outcome = agent.handle_frame(&ServerScript::checksum(&"0".repeat(40)));
        assert_eq!(outcome, HandleOutcome::Dropped);
        assert!(!agent.session().checksum_failed());
    }

    #[test]
    fn test_invalid_filename_is_dropped() {
        let root = DeviceRoot::new();
        let mut agent = negotiated(&root);
        for name in ["../escape.py", "/abs.py", "cfg.py.bak"] {
            assert_eq!(
                agent.handle_frame(&ServerScript::filename(name)),
                HandleOutcome::Dropped
            );
        }
        assert_eq!(agent.session().manifest().counters().total(), 0);
        assert_eq!(agent.session().file_to_patch(), None);
    }

    #[test]
    fn test_messages_out_of_state_are_dropped() {
        let root = DeviceRoot::with_files(&[("cfg.py", "a")]);
        let mut agent = agent_for(&root, "1.0.0");

        for frame in [
            ServerScript::filename("cfg.py"),
            ServerScript::delete_file("cfg.py"),
            ServerScript::manifest(0, 0, 0),
            ServerScript::multicast_key(),
            b"$OTA,4,*".to_vec(),
        ] {
            assert_eq!(agent.handle_frame(&frame), HandleOutcome::Dropped);
        }
        assert_eq!(root.read("cfg.py").as_deref(), Some("a"));
        assert!(agent.transport().sent.is_empty());
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let root = DeviceRoot::new();
        let mut agent = negotiated(&root);
        for frame in [&b"$OTA,42,x,*"[..], b"$OTA,5,cfg.py", b"garbage", b""] {
            assert_eq!(agent.handle_frame(frame), HandleOutcome::Dropped);
        }
        assert_eq!(agent.session().state(), SessionState::Receiving);
    }
}

mod failures {
    use super::*;

    #[test]
    fn test_checksum_mismatch_is_sticky_and_reverts() {
        let root = DeviceRoot::with_files(&[("a.py", "one"), ("b.py", "two"), ("gone.py", "x")]);
        let mut agent = negotiated(&root);

        let patch_text = lora_ota_update::text_patch::make_patch("one", "uno");
        agent.handle_frame(&ServerScript::filename("a.py"));
        feed(&mut agent, &ServerScript::patch_fragments(&patch_text, 2));
        agent.handle_frame(&ServerScript::checksum(&"f".repeat(40)));
        assert!(agent.session().checksum_failed());
        assert!(agent.session().verified_patches().is_empty());

        feed(&mut agent, &ServerScript::file_transfer("b.py", "two", "dos", 1));
        assert!(agent.session().checksum_failed());
        agent.handle_frame(&ServerScript::delete_file("gone.py"));

        let outcome = agent.handle_frame(&ServerScript::manifest(0, 2, 1));
        assert_eq!(outcome, HandleOutcome::Reverted);
        assert_eq!(root.read("a.py").as_deref(), Some("one"));
        assert_eq!(root.read("b.py").as_deref(), Some("two"));
        assert_eq!(root.read("gone.py").as_deref(), Some("x"));
        assert!(root.artifacts().is_empty());
        assert_eq!(agent.reboot_handle().reverted(), 1);
    }

    #[test]
    fn test_corrupt_fragment_fails_checksum() {
        let root = DeviceRoot::with_files(&[("cfg.py", "a")]);
        let mut agent = negotiated(&root);
        let patch_text = "@@ -1,1 +1,1 @@\n-a\n+b\n";

        agent.handle_frame(&ServerScript::filename("cfg.py"));
        agent.handle_frame(&ServerScript::patch(b"this is not zlib"));
        agent.handle_frame(&ServerScript::checksum_for(patch_text));
        assert!(agent.session().checksum_failed());

        assert_eq!(
            agent.handle_frame(&ServerScript::manifest(0, 1, 0)),
            HandleOutcome::Reverted
        );
        assert_eq!(root.read("cfg.py").as_deref(), Some("a"));
    }

    #[test]
    fn test_manifest_mismatch_reverts() {
        let root = DeviceRoot::with_files(&[("cfg.py", "a")]);

        for (new, updated, deleted) in [(1, 1, 0), (0, 2, 0), (0, 1, 1)] {
            let mut agent = negotiated(&root);
            feed(&mut agent, &ServerScript::file_transfer("cfg.py", "a", "b", 2));
            assert_eq!(
                agent.handle_frame(&ServerScript::manifest(new, updated, deleted)),
                HandleOutcome::Reverted
            );
            assert_eq!(root.read("cfg.py").as_deref(), Some("a"));
            assert_eq!(agent.reboot_handle().reverted(), 1);
        }

        let mut agent = negotiated(&root);
        feed(&mut agent, &ServerScript::file_transfer("cfg.py", "a", "b", 2));
        assert_eq!(
            agent.handle_frame(&ServerScript::manifest(0, 1, 0)),
            HandleOutcome::Committed
        );
        assert_eq!(root.read("cfg.py").as_deref(), Some("b"));
    }

    #[test]
    fn test_unparseable_manifest_reverts() {
        let root = DeviceRoot::with_files(&[("old.py", "x")]);
        let mut agent = negotiated(&root);
        agent.handle_frame(&ServerScript::delete_file("old.py"));

        let outcome = agent.handle_frame(b"$OTA,9,new=0;update=0;delete=1,*");
        assert_eq!(outcome, HandleOutcome::Reverted);
        assert_eq!(root.read("old.py").as_deref(), Some("x"));
    }

    #[test]
    fn test_patch_that_does_not_apply_reverts() {
        let root = DeviceRoot::with_files(&[("cfg.py", "something else entirely")]);
        let mut agent = negotiated(&root);
        feed(
            &mut agent,
            &ServerScript::file_transfer("cfg.py", "expected text", "new text", 1),
        );

        assert_eq!(
            agent.handle_frame(&ServerScript::manifest(0, 1, 0)),
            HandleOutcome::Reverted
        );
        assert_eq!(root.read("cfg.py").as_deref(), Some("something else entirely"));
        assert!(root.artifacts().is_empty());
    }

    #[test]
    fn test_filename_before_previous_checksum_fails_session() {
        let root = DeviceRoot::with_files(&[("a.py", "1"), ("b.py", "2")]);
        let mut agent = negotiated(&root);

        agent.handle_frame(&ServerScript::filename("a.py"));
        feed(&mut agent, &ServerScript::file_transfer("b.py", "2", "3", 1));
        assert!(agent.session().checksum_failed());

        assert_eq!(
            agent.handle_frame(&ServerScript::manifest(0, 2, 0)),
            HandleOutcome::Reverted
        );
        assert_eq!(root.read("b.py").as_deref(), Some("2"));
    }

    #[test]
    fn test_new_file_never_lands_on_mismatch() {
        let root = DeviceRoot::new();
        let mut agent = negotiated(&root);
        feed(&mut agent, &ServerScript::file_transfer("new.py", "", "x = 1\n", 1));

        assert_eq!(
            agent.handle_frame(&ServerScript::manifest(0, 0, 0)),
            HandleOutcome::Reverted
        );
        assert!(!root.exists("new.py"));
        assert!(root.artifacts().is_empty());
    }
}

mod watchdog {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::sync::mpsc::error::TryRecvError;

    fn spawn_watchdog(agent: &MockAgent) -> mpsc::UnboundedReceiver<Duration> {
        let (tx, rx) = mpsc::unbounded_channel();
        agent.watchdog().spawn(Box::new(move |idle| {
            if let Err(e) = tx.send(idle) {
                eprintln!("expiry receiver gone: {e}");
            }
        }));
        rx
    }

    async fn settle(duration: Duration) {
        tokio::time::sleep(duration).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_session_reverts_exactly_once() -> TestResult {
        let root = DeviceRoot::with_files(&[("old.py", "keep me")]);
        let mut agent = agent_for(&root, "1.0.0");
        let mut expiries = spawn_watchdog(&agent);

        feed(&mut agent, &ServerScript::negotiation("1.0.1"));
        agent.handle_frame(&ServerScript::delete_file("old.py"));
        assert!(!root.exists("old.py"));

        settle(Duration::from_secs(59)).await;
        assert_eq!(expiries.try_recv(), Err(TryRecvError::Empty));

        settle(Duration::from_secs(2)).await;
        let idle = expiries.try_recv()?;
        assert_eq!(agent.on_watchdog_expired(idle), HandleOutcome::Reverted);
        assert_eq!(root.read("old.py").as_deref(), Some("keep me"));

        settle(Duration::from_secs(600)).await;
        assert_eq!(expiries.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(agent.reboot_handle().reverted(), 1);
        assert_eq!(agent.session().state(), SessionState::Idle);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_traffic_keeps_session_alive() -> TestResult {
        let root = DeviceRoot::with_files(&[("cfg.py", "a")]);
        let mut agent = agent_for(&root, "1.0.0");
        let mut expiries = spawn_watchdog(&agent);

        feed(&mut agent, &ServerScript::negotiation("1.0.1"));
        for frame in ServerScript::file_transfer("cfg.py", "a", "b", 4) {
            settle(Duration::from_secs(45)).await;
            agent.handle_frame(&frame);
        }
        settle(Duration::from_secs(45)).await;
        assert_eq!(expiries.try_recv(), Err(TryRecvError::Empty));

        assert_eq!(
            agent.handle_frame(&ServerScript::manifest(0, 1, 0)),
            HandleOutcome::Committed
        );
        settle(Duration::from_secs(600)).await;
        assert_eq!(expiries.try_recv(), Err(TryRecvError::Empty));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_frames_do_not_refresh() -> TestResult {
        let root = DeviceRoot::new();
        let mut agent = agent_for(&root, "1.0.0");
        let mut expiries = spawn_watchdog(&agent);

        feed(&mut agent, &ServerScript::negotiation("1.0.1"));
        for _ in 0..4 {
            settle(Duration::from_secs(20)).await;
            agent.handle_frame(&ServerScript::patch(b"orphan"));
        }
        let idle = expiries.try_recv()?;
        assert!(idle >= Duration::from_secs(60));
        assert_eq!(agent.on_watchdog_expired(idle), HandleOutcome::Reverted);
        Ok(())
    }

    #[test]
    fn test_expiry_without_session_is_ignored() {
        let root = DeviceRoot::new();
        let mut agent = agent_for(&root, "1.0.0");
        assert_eq!(
            agent.on_watchdog_expired(Duration::from_secs(61)),
            HandleOutcome::Dropped
        );
        assert_eq!(agent.reboot_handle().count(), 0);
    }
}

mod recovery {
    use super::*;

    #[test]
    fn test_boot_sweep_reverts_interrupted_session() -> TestResult {
        let root = DeviceRoot::with_files(&[
            ("main.py", "half new"),
            ("main.py.bak", "old"),
            ("fresh.py", "created"),
            ("fresh.py.del", ""),
            ("lib/x.py.tmp", "partial"),
        ]);
        let mut agent = agent_for(&root, "1.0.0");

        let report = agent.recover()?;
        assert_eq!(
            report,
            RevertReport {
                restored: 1,
                removed: 1,
                discarded: 1,
                failed: Vec::new(),
            }
        );
        assert_eq!(root.read("main.py").as_deref(), Some("old"));
        assert!(!root.exists("fresh.py"));
        assert!(root.artifacts().is_empty());
        Ok(())
    }

    #[test]
    fn test_announce_sends_device_version() -> TestResult {
        let root = DeviceRoot::new();
        let mut agent = agent_for(&root, "1.0.1");
        agent.announce()?;
        assert_eq!(agent.transport().sent, vec![b"$OTA,0,1.0.1,*".to_vec()]);
        Ok(())
    }

    #[test]
    fn test_announce_surfaces_transport_failure() {
        let root = DeviceRoot::new();
        let mut transport = MockTransport::new();
        transport.fail_send = true;
        let mut agent = must(OtaAgent::new(
            AgentConfig::with_root(root.path()),
            must(FirmwareVersion::parse("1.0.1")),
            transport,
            MockReboot::new(),
            MockClock::at(1_700_000_000),
        ));
        assert!(matches!(agent.announce(), Err(OtaError::Transport(_))));
    }
}
