//! Integration tests for the routing core
//!
//! These tests drive a [`Controller`] the way the transport would and check:
//! - Interlock behavior as seen on the panels (exactly one lit selector)
//! - Idempotent re-selection
//! - Rejection of malformed presses
//! - Catch-up of surfaces that come online late
//! - Switcher outcomes reported on the event stream

use std::collections::HashMap;

use av_route::{
    Controller, DriverError, EndpointId, FeedbackFrame, FeedbackSignal, OutputId, OutputState,
    RawEvent, RoomConfig, RoomEvent, RouteCommand, RouteError, SourceIndex, SwitcherCommand,
    SwitcherRequest,
};
use tokio::sync::mpsc;

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// What a surface is currently showing
    #[derive(Debug, Default)]
    pub struct Display {
        pub digital: HashMap<u32, bool>,
        pub serial: HashMap<u32, String>,
    }

    impl Display {
        pub fn apply(&mut self, frame: &FeedbackFrame) {
            for signal in &frame.signals {
                match signal {
                    FeedbackSignal::Digital { join, value } => {
                        self.digital.insert(*join, *value);
                    }
                    FeedbackSignal::Serial { join, text } => {
                        self.serial.insert(*join, text.clone());
                    }
                }
            }
        }

        /// Lit joins within an inclusive range
        pub fn lit_in(&self, low: u32, high: u32) -> Vec<u32> {
            let mut lit: Vec<u32> = self
                .digital
                .iter()
                .filter(|(join, value)| (low..=high).contains(*join) && **value)
                .map(|(join, _)| *join)
                .collect();
            lit.sort_unstable();
            lit
        }

        pub fn text(&self, join: u32) -> Option<&str> {
            self.serial.get(&join).map(String::as_str)
        }
    }

    pub struct Panel {
        pub id: EndpointId,
        pub rx: mpsc::Receiver<FeedbackFrame>,
        pub display: Display,
    }

    impl Panel {
        /// Apply every frame delivered so far
        pub fn drain(&mut self) {
            while let Ok(frame) = self.rx.try_recv() {
                assert_eq!(frame.surface, self.id);
                self.display.apply(&frame);
            }
        }
    }

    pub struct Room {
        pub controller: Controller,
        pub touch: Panel,
        pub xpanel: Panel,
        pub switcher: EndpointId,
        pub event_tx: mpsc::Sender<RoomEvent>,
        pub event_rx: mpsc::Receiver<RoomEvent>,
    }

    impl Room {
        pub async fn send(&mut self, event: RawEvent) -> Result<(), RouteError> {
            self.controller.ingest(event, &self.event_tx).await
        }

        pub async fn online(&mut self, endpoint: EndpointId) {
            self.send(RawEvent::Reachability {
                endpoint,
                online: true,
            })
            .await
            .unwrap();
        }

        pub async fn offline(&mut self, endpoint: EndpointId) {
            self.send(RawEvent::Reachability {
                endpoint,
                online: false,
            })
            .await
            .unwrap();
        }

        pub async fn press(&mut self, endpoint: EndpointId, join: u32) -> Result<(), RouteError> {
            self.send(RawEvent::press(endpoint, join)).await
        }

        pub fn drain_panels(&mut self) {
            self.touch.drain();
            self.xpanel.drain();
        }

        pub fn drain_events(&mut self) -> Vec<RoomEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.event_rx.try_recv() {
                events.push(event);
            }
            events
        }
    }

    /// Default room with both panels attached and no switcher link
    pub fn room() -> Room {
        let mut controller = Controller::from_config(&RoomConfig::default()).unwrap();
        let touch = controller.endpoint_id("Touch Panel").unwrap();
        let xpanel = controller.endpoint_id("Xpanel").unwrap();
        let switcher = controller.switcher_id();

        let (touch_tx, touch_rx) = mpsc::channel(256);
        let (xpanel_tx, xpanel_rx) = mpsc::channel(256);
        controller.attach_surface(touch, touch_tx).unwrap();
        controller.attach_surface(xpanel, xpanel_tx).unwrap();

        let (event_tx, event_rx) = mpsc::channel(1024);
        Room {
            controller,
            touch: Panel {
                id: touch,
                rx: touch_rx,
                display: Display::default(),
            },
            xpanel: Panel {
                id: xpanel,
                rx: xpanel_rx,
                display: Display::default(),
            },
            switcher,
            event_tx,
            event_rx,
        }
    }

    /// Attach a switcher that acknowledges everything and records commands
    pub fn attach_acking_switcher(room: &mut Room) -> mpsc::UnboundedReceiver<SwitcherCommand> {
        let (tx, mut rx) = mpsc::channel::<SwitcherRequest>(64);
        let (log_tx, log_rx) = mpsc::unbounded_channel();
        room.controller.attach_switcher(tx);

        tokio::spawn(async move {
            while let Some(req) = rx.recv().await {
                let _ = log_tx.send(req.command);
                let _ = req.ack.send(Ok(()));
            }
        });
        log_rx
    }

    pub fn route_outcomes(events: &[RoomEvent]) -> Vec<&RoomEvent> {
        events.iter().filter(|e| e.is_driver_outcome()).collect()
    }
}

use helpers::*;

// ============================================================================
// Interlock Tests
// ============================================================================

mod interlock_tests {
    use super::*;

    #[tokio::test]
    async fn test_select_clear_sequence() {
        let mut room = room();
        let (touch, xpanel) = (room.touch.id, room.xpanel.id);
        room.online(touch).await;
        room.online(xpanel).await;

        room.press(touch, 12).await.unwrap();
        room.drain_panels();
        assert_eq!(room.touch.display.lit_in(11, 15), vec![12]);
        assert_eq!(room.touch.display.text(11), Some("Laptop"));

        room.press(xpanel, 14).await.unwrap();
        room.drain_panels();
        assert_eq!(room.touch.display.lit_in(11, 15), vec![14]);
        assert_eq!(room.xpanel.display.lit_in(11, 15), vec![14]);
        assert_eq!(room.touch.display.text(11), Some("AppleTv"));

        room.press(touch, 16).await.unwrap();
        room.drain_panels();
        assert!(room.touch.display.lit_in(11, 15).is_empty());
        assert!(room.xpanel.display.lit_in(11, 15).is_empty());
        assert_eq!(room.xpanel.display.text(11), Some("No Input Selected"));
        assert_eq!(room.touch.display.digital.get(&16), Some(&false));

        room.press(xpanel, 11).await.unwrap();
        room.drain_panels();
        assert_eq!(room.touch.display.lit_in(11, 15), vec![11]);
        assert_eq!(room.xpanel.display.text(11), Some("Main PC"));
        assert_eq!(
            room.controller.engine().state(OutputId(1)),
            Some(OutputState::SelectedTo(SourceIndex(1)))
        );
    }

    #[tokio::test]
    async fn test_reselect_is_idempotent() {
        let mut room = room();
        let touch = room.touch.id;
        room.online(touch).await;

        room.press(touch, 13).await.unwrap();
        room.drain_panels();
        let before = room.controller.engine().snapshot();
        room.drain_events();

        room.press(touch, 13).await.unwrap();
        room.drain_panels();

        assert_eq!(room.controller.engine().snapshot(), before);
        assert_eq!(room.touch.display.lit_in(11, 15), vec![13]);

        // The selection is still re-asserted
        let events = room.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, RoomEvent::SelectionChanged { .. })));
    }

    #[tokio::test]
    async fn test_release_does_nothing() {
        let mut room = room();
        let touch = room.touch.id;
        room.online(touch).await;
        room.press(touch, 12).await.unwrap();

        room.send(RawEvent::release(touch, 12)).await.unwrap();
        room.send(RawEvent::release(touch, 16)).await.unwrap();

        assert_eq!(
            room.controller.engine().state(OutputId(1)),
            Some(OutputState::SelectedTo(SourceIndex(2)))
        );
    }
}

// ============================================================================
// Rejection Tests
// ============================================================================

mod rejection_tests {
    use super::*;

    fn wide_range_config() -> RoomConfig {
        let mut config = RoomConfig::default();
        for surface in &mut config.surfaces {
            surface.groups[0].select_range = [11, 110];
            surface.groups[0].clear_button = 111;
            surface.groups[0].source_name_join = 11;
        }
        config
    }

    #[tokio::test]
    async fn test_out_of_catalog_press_is_rejected() {
        let mut controller = Controller::from_config(&wide_range_config()).unwrap();
        let touch = controller.endpoint_id("Touch Panel").unwrap();
        let (event_tx, mut event_rx) = mpsc::channel(16);

        controller
            .ingest(
                RawEvent::Reachability {
                    endpoint: touch,
                    online: true,
                },
                &event_tx,
            )
            .await
            .unwrap();
        controller
            .ingest(RawEvent::press(touch, 12), &event_tx)
            .await
            .unwrap();

        // Join 109 is slot 99 of a five-source catalog
        let result = controller.ingest(RawEvent::press(touch, 109), &event_tx).await;
        assert_eq!(
            result,
            Err(RouteError::InvalidSourceIndex {
                index: 99,
                catalog_len: 5
            })
        );
        assert_eq!(
            controller.engine().state(OutputId(1)),
            Some(OutputState::SelectedTo(SourceIndex(2)))
        );

        let mut rejected = false;
        while let Ok(event) = event_rx.try_recv() {
            if let RoomEvent::SignalRejected { endpoint, .. } = event {
                assert_eq!(endpoint, touch);
                rejected = true;
            }
        }
        assert!(rejected);
    }

    #[tokio::test]
    async fn test_press_from_switcher_is_ignored() {
        let mut room = room();
        let switcher = room.switcher;
        room.online(switcher).await;

        room.press(switcher, 12).await.unwrap();
        assert_eq!(
            room.controller.engine().state(OutputId(1)),
            Some(OutputState::Unselected)
        );
    }

    #[tokio::test]
    async fn test_unknown_endpoint() {
        let mut room = room();
        assert_eq!(
            room.press(EndpointId(42), 12).await,
            Err(RouteError::UnknownEndpoint(EndpointId(42)))
        );
        assert_eq!(
            room.send(RawEvent::Reachability {
                endpoint: EndpointId(42),
                online: true,
            })
            .await,
            Err(RouteError::UnknownEndpoint(EndpointId(42)))
        );
    }
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_surface_misses_updates_then_catches_up() {
        let mut room = room();
        let (touch, xpanel) = (room.touch.id, room.xpanel.id);
        room.online(touch).await;

        room.press(touch, 15).await.unwrap();
        room.drain_panels();
        assert!(room.xpanel.display.digital.is_empty());

        room.online(xpanel).await;
        room.drain_panels();
        assert_eq!(room.xpanel.display.lit_in(11, 15), vec![15]);
        assert_eq!(room.xpanel.display.text(11), Some("Video Conference"));
        assert_eq!(room.xpanel.display.text(10), Some("Beta - Prog"));

        room.offline(touch).await;
        room.press(xpanel, 11).await.unwrap();
        room.drain_panels();
        assert_eq!(room.touch.display.lit_in(11, 15), vec![15]);

        room.online(touch).await;
        room.drain_panels();
        assert_eq!(room.touch.display.lit_in(11, 15), vec![11]);
    }

    #[tokio::test]
    async fn test_lifecycle_events_emitted() {
        let mut room = room();
        let touch = room.touch.id;
        room.online(touch).await;
        room.offline(touch).await;

        let events = room.drain_events();
        assert_eq!(
            events,
            vec![
                RoomEvent::EndpointOnline {
                    endpoint: touch,
                    name: "Touch Panel".to_string()
                },
                RoomEvent::EndpointOffline {
                    endpoint: touch,
                    name: "Touch Panel".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_switcher_identity_change() {
        let mut room = room();
        let switcher = room.switcher;
        room.send(RawEvent::Identity {
            endpoint: switcher,
            address: None,
        })
        .await
        .unwrap();

        let descriptor = room.controller.registry().identity(switcher).unwrap();
        assert_eq!(descriptor.address, None);
        assert!(room.drain_events().iter().all(|e| e.is_lifecycle()));
    }
}

// ============================================================================
// Switcher Outcome Tests
// ============================================================================

mod switcher_tests {
    use super::*;

    #[tokio::test]
    async fn test_commands_reach_switcher_in_order() {
        let mut room = room();
        let mut log = attach_acking_switcher(&mut room);
        let (touch, switcher) = (room.touch.id, room.switcher);
        room.online(switcher).await;
        room.online(touch).await;

        room.press(touch, 12).await.unwrap();
        room.press(touch, 14).await.unwrap();
        room.press(touch, 16).await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(log.recv().await.unwrap());
        }
        assert_eq!(
            seen,
            vec![
                SwitcherCommand::SetVideoOut {
                    output: OutputId(1),
                    input: 2
                },
                SwitcherCommand::SetVideoOut {
                    output: OutputId(1),
                    input: 4
                },
                SwitcherCommand::ClearVideoOut {
                    output: OutputId(1)
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_applied_outcome_reported() {
        let mut room = room();
        let _log = attach_acking_switcher(&mut room);
        let (touch, switcher) = (room.touch.id, room.switcher);
        room.online(switcher).await;
        room.online(touch).await;
        room.drain_events();

        room.press(touch, 13).await.unwrap();

        loop {
            match room.event_rx.recv().await.unwrap() {
                RoomEvent::RouteApplied { command } => {
                    assert_eq!(
                        command,
                        RouteCommand::ApplyRoute {
                            output: OutputId(1),
                            source: SourceIndex(3)
                        }
                    );
                    break;
                }
                RoomEvent::RouteFailed { error, .. } => panic!("Unexpected failure: {}", error),
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn test_offline_switcher_fails_but_feedback_still_updates() {
        let mut room = room();
        let _log = attach_acking_switcher(&mut room);
        let touch = room.touch.id;
        room.online(touch).await;

        room.press(touch, 14).await.unwrap();
        room.drain_panels();

        assert_eq!(room.touch.display.lit_in(11, 15), vec![14]);
        let events = room.drain_events();
        let outcomes = route_outcomes(&events);
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            outcomes[0],
            RoomEvent::RouteFailed {
                error: DriverError::Offline,
                ..
            }
        ));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Press { xpanel: bool, join: u32 },
        Release { xpanel: bool, join: u32 },
        Reachability { xpanel: bool, online: bool },
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (any::<bool>(), 9u32..=18).prop_map(|(xpanel, join)| Op::Press { xpanel, join }),
            1 => (any::<bool>(), 11u32..=16).prop_map(|(xpanel, join)| Op::Release { xpanel, join }),
            1 => (any::<bool>(), any::<bool>())
                .prop_map(|(xpanel, online)| Op::Reachability { xpanel, online }),
        ]
    }

    proptest! {
        #[test]
        fn online_panels_never_show_two_selections(ops in prop::collection::vec(op(), 1..60)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let mut room = room();
                let (touch, xpanel) = (room.touch.id, room.xpanel.id);
                room.online(touch).await;
                room.online(xpanel).await;

                for op in ops {
                    let target = |x: bool| if x { xpanel } else { touch };
                    let event = match op {
                        Op::Press { xpanel, join } => RawEvent::press(target(xpanel), join),
                        Op::Release { xpanel, join } => RawEvent::release(target(xpanel), join),
                        Op::Reachability { xpanel, online } => RawEvent::Reachability {
                            endpoint: target(xpanel),
                            online,
                        },
                    };
                    room.send(event).await.unwrap();
                    room.drain_panels();
                    room.drain_events();

                    let expected: Vec<u32> = match room.controller.engine().state(OutputId(1)) {
                        Some(OutputState::SelectedTo(source)) => vec![10 + source.as_u32()],
                        _ => Vec::new(),
                    };

                    for panel in [&room.touch, &room.xpanel] {
                        let lit = panel.display.lit_in(11, 15);
                        prop_assert!(lit.len() <= 1);
                        if room.controller.registry().is_online(panel.id) {
                            prop_assert_eq!(&lit, &expected);
                        }
                    }
                }
                Ok(())
            })?;
        }
    }
}
