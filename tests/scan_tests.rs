#[cfg(test)]
mod scan_proptests {

    use prop::string::string_regex;
    use proptest::prelude::*;

    use qrscan::reader::decode_frame;
    use qrscan::scanner::{classify, on_scan, Action, DebounceState};
    use qrscan::*;

    pub fn ec_level_strategy() -> BoxedStrategy<ECLevel> {
        prop_oneof![Just(ECLevel::L), Just(ECLevel::M), Just(ECLevel::Q), Just(ECLevel::H)].boxed()
    }

    pub fn scan_strategy(regex: &str) -> impl Strategy<Value = (ECLevel, String)> {
        (ec_level_strategy(), string_regex(regex).unwrap())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn proptest_generated_code_scans_back(params in scan_strategy(r"[a-zA-Z0-9 .:/@+\-]{1,120}")) {
            let (ecl, text) = params;
            prop_assume!(!text.trim().is_empty());

            let img = QRBuilder::new(&text).size(400).margin(4).ec_level(ecl).build().unwrap();
            let decoded = decode_frame(&img.into());

            prop_assert_eq!(decoded, vec![text.clone()]);
        }

        #[test]
        fn proptest_classify_is_stable(text in ".{0,80}") {
            let first = classify(&text);
            prop_assert_eq!(first, classify(&text));
            prop_assert_ne!(first, ScanType::Generated);
        }

        #[test]
        fn proptest_one_save_per_window(gaps in prop::collection::vec(0i64..2_000, 1..60)) {
            let mut state = DebounceState::new();
            let mut now = 1_700_000_000_000;
            let mut saves: Vec<i64> = Vec::new();
            for gap in gaps {
                now += gap;
                if let Action::Persist(..) = on_scan("same value", now, &mut state) {
                    saves.push(now);
                }
            }
            prop_assert!(!saves.is_empty());
            for w in saves.windows(2) {
                prop_assert!(w[1] - w[0] >= 5_000, "saved twice within window: {:?}", w);
            }
        }
    }
}

#[cfg(test)]
mod scan_flow_tests {
    use test_case::test_case;

    use qrscan::reader::{decode_file, frame_events, image_files};
    use qrscan::scanner::{Intervals, OpenAction, ScanSession, SessionEvent};
    use qrscan::common::Prefs;
    use qrscan::store::{sign_out, Auth, HistoryStore, Identity, ProfileStore, Stores, LOCAL_UID};
    use qrscan::*;

    const T0: i64 = 1_700_000_000_000;

    fn config(dir: &std::path::Path, mode: AppMode) -> Config {
        let mut config = Config::with_data_dir(dir);
        config.mode = mode;
        config
    }

    async fn run_frames(stores: &Stores, frames: &[(&str, i64)]) -> Vec<SessionEvent> {
        let mut session = ScanSession::start(Intervals::default(), stores.history.clone());
        let handle = session.handle();
        for (text, t) in frames {
            let img = QRBuilder::new(text).size(256).build().unwrap();
            for event in frame_events(&img.into(), *t) {
                handle.submit(event);
            }
        }
        session.stop().await;
        let mut events = Vec::new();
        while let Some(e) = session.try_next_event() {
            events.push(e);
        }
        events
    }

    #[test_case("https://example.com/a?b=c", ScanType::Url, OpenAction::Browse("https://example.com/a?b=c".into()))]
    #[test_case("example.com", ScanType::Url, OpenAction::Browse("http://example.com".into()))]
    #[test_case("user@example.com", ScanType::Email, OpenAction::ShowContent("user@example.com".into()))]
    #[test_case("+1 555 0100", ScanType::Phone, OpenAction::ShowContent("+1 555 0100".into()))]
    #[test_case("WIFI:S:home;T:WPA;P:secret;;", ScanType::Text, OpenAction::ShowContent("WIFI:S:home;T:WPA;P:secret;;".into()))]
    #[tokio::test]
    async fn test_camera_frames_to_history(text: &str, kind: ScanType, open: OpenAction) {
        let dir = tempfile::tempdir().unwrap();
        let auth = Auth::signed_in(Identity::new("u1", None));
        let stores = Stores::open(&config(dir.path(), AppMode::Online), auth).unwrap();

        // Code held in view for two seconds at four frames per second
        let frames: Vec<_> = (0..8).map(|i| (text, T0 + i * 250)).collect();
        let events = run_frames(&stores, &frames).await;

        assert_eq!(
            events[0],
            SessionEvent::Detected { content: text.to_string(), kind, open }
        );
        assert_eq!(events.len(), 2);

        let history = stores.history.list().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, text);
        assert_eq!(history[0].kind, kind);
        assert_eq!(history[0].user_id, "u1");
    }

    #[tokio::test]
    async fn test_history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), AppMode::Offline);
        {
            let stores = Stores::open(&config, Auth::new()).unwrap();
            run_frames(&stores, &[("first", T0), ("second", T0 + 100), ("first", T0 + 200)]).await;
            stores.history.save_generated("made here").unwrap();
        }

        let stores = Stores::open(&config, Auth::new()).unwrap();
        let history = stores.history.list().unwrap();
        assert_eq!(history.len(), 4);
        assert!(history.iter().all(|e| e.user_id == LOCAL_UID));
        assert_eq!(history.iter().filter(|e| e.kind == ScanType::Generated).count(), 1);
        assert!(dir.path().join("offline.json").exists());
        assert!(!dir.path().join("cloud.json").exists());
    }

    #[tokio::test]
    async fn test_signed_out_scans_fail_without_state_rollback() {
        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::open(&config(dir.path(), AppMode::Online), Auth::new()).unwrap();

        let events = run_frames(&stores, &[("hello", T0), ("hello", T0 + 500)]).await;
        let failures: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::SaveFailed { error, .. } => Some(error.notice()),
                _ => None,
            })
            .collect();
        assert_eq!(failures, vec!["User not authenticated"]);
    }

    #[test]
    fn test_gallery_directory() {
        let dir = tempfile::tempdir().unwrap();
        QRBuilder::new("one").size(200).build().unwrap().save(dir.path().join("1.png")).unwrap();
        QRBuilder::new("two").size(200).build().unwrap().save(dir.path().join("2.png")).unwrap();
        image::RgbaImage::from_pixel(50, 50, image::Rgba([255, 255, 255, 255]))
            .save(dir.path().join("3.png"))
            .unwrap();

        let decoded: Vec<_> =
            image_files(dir.path()).iter().map(|p| decode_file(p).unwrap()).collect();
        assert_eq!(decoded, vec![Some("one".to_string()), Some("two".to_string()), None]);
    }

    #[test]
    fn test_profile_and_sign_out() {
        let dir = tempfile::tempdir().unwrap();
        let identity = Identity::new("u1", Some("u1@example.com".into()));
        Prefs { offline: false, user: Some(identity.clone()) }.save(dir.path()).unwrap();

        let config = config(dir.path(), AppMode::Online).with_prefs().unwrap();
        let auth = Auth::signed_in(identity);
        let stores = Stores::open(&config, auth.clone()).unwrap();

        stores.profiles.increment_scan_count().unwrap();
        let saved = stores.profiles.save_edit("  Ada  ", None).unwrap();
        assert_eq!(saved.display_name, "Ada");
        assert_eq!(saved.total_scans, 1);

        sign_out(&auth, dir.path()).unwrap();
        assert_eq!(stores.profiles.get_profile(), Err(ScanError::NotAuthenticated));
        assert_eq!(Prefs::load(dir.path()).unwrap(), None);
    }
}
