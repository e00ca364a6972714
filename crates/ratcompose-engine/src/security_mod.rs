use ratcompose_core::{Envelope, Recommendation, SecurityFlags, log_debug};

use crate::collab_mod::{Answer, ComposeOptions, CryptoApp, CryptoBackend, Prompter};
use crate::error_mod::ComposeError;

const AUTOCRYPT_PROMPT: &str = "Autocrypt: (e)ncrypt, (c)lear, (a)utomatic?";
const AUTOCRYPT_LETTERS: &str = "eca";

/// Lines shown in the security block of the envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityDisplay {
    pub main: String,
    pub sign_as: Option<String>,
    pub autocrypt: Option<String>,
}

/// Keeps the message's security flags coherent across PGP, S/MIME and
/// Autocrypt choices.
#[derive(Debug, Clone, Default)]
pub struct SecurityEngine {
    recommendation: Recommendation,
}

/// Leaves at most one of PGP and S/MIME set, keeping `keep`.
pub fn enforce_exclusivity(flags: &mut SecurityFlags, keep: CryptoApp) {
    if flags.contains(SecurityFlags::PGP | SecurityFlags::SMIME) {
        flags.remove(keep.other().flag());
    }
    if flags.contains(SecurityFlags::SMIME) {
        flags.remove(SecurityFlags::AUTOCRYPT | SecurityFlags::AUTOCRYPT_OVERRIDE);
    }
}

fn preferred_app(prior: SecurityFlags) -> CryptoApp {
    if prior.contains(SecurityFlags::SMIME) && !prior.contains(SecurityFlags::PGP) {
        CryptoApp::Smime
    } else {
        CryptoApp::Pgp
    }
}

impl SecurityEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recommendation(&self) -> Recommendation {
        self.recommendation
    }

    /// Re-derives flags after an address edit or a security choice.
    pub fn recompute(
        &mut self,
        flags: &mut SecurityFlags,
        envelope: &Envelope,
        options: &dyn ComposeOptions,
        crypto: &mut dyn CryptoBackend,
    ) {
        let prior = *flags;
        if options.opportunistic_encrypt() {
            *flags = crypto.opportunistic_encrypt(*flags, envelope);
        }
        if options.autocrypt() {
            self.recommendation = crypto.autocrypt_recommendation(envelope);
            let manual = SecurityFlags::ENCRYPT | SecurityFlags::SIGN | SecurityFlags::SMIME;
            if flags.intersects(manual) {
                flags.remove(SecurityFlags::AUTOCRYPT | SecurityFlags::AUTOCRYPT_OVERRIDE);
            } else if !flags.contains(SecurityFlags::AUTOCRYPT_OVERRIDE) {
                if self.recommendation == Recommendation::Yes {
                    flags.insert(SecurityFlags::AUTOCRYPT | SecurityFlags::PGP);
                    flags.remove(SecurityFlags::INLINE | SecurityFlags::SMIME);
                } else {
                    flags.remove(SecurityFlags::AUTOCRYPT);
                }
            }
        } else {
            self.recommendation = Recommendation::Off;
        }
        enforce_exclusivity(flags, preferred_app(prior));
        if *flags != prior {
            log_debug(&format!("security recompute: {} -> {}", prior, flags));
        }
    }

    pub fn pgp_menu(
        &mut self,
        flags: &mut SecurityFlags,
        envelope: &Envelope,
        options: &dyn ComposeOptions,
        crypto: &mut dyn CryptoBackend,
        prompter: &mut dyn Prompter,
    ) -> Result<bool, ComposeError> {
        self.app_menu(CryptoApp::Pgp, flags, envelope, options, crypto, prompter)
    }

    pub fn smime_menu(
        &mut self,
        flags: &mut SecurityFlags,
        envelope: &Envelope,
        options: &dyn ComposeOptions,
        crypto: &mut dyn CryptoBackend,
        prompter: &mut dyn Prompter,
    ) -> Result<bool, ComposeError> {
        self.app_menu(CryptoApp::Smime, flags, envelope, options, crypto, prompter)
    }

    /// Switches to `app` and lets the backend pick sign/encrypt. Returns
    /// whether the flags ended up different.
    fn app_menu(
        &mut self,
        app: CryptoApp,
        flags: &mut SecurityFlags,
        envelope: &Envelope,
        options: &dyn ComposeOptions,
        crypto: &mut dyn CryptoBackend,
        prompter: &mut dyn Prompter,
    ) -> Result<bool, ComposeError> {
        if !crypto.has_application(app) {
            return Err(ComposeError::NoBackend(app.name()));
        }
        let old = *flags;
        let other = app.other();
        if flags.contains(other.flag()) {
            // Autocrypt encryption only exists under PGP, so leaving PGP
            // throws it away as well.
            let mut active = SecurityFlags::ENCRYPT | SecurityFlags::SIGN;
            if other == CryptoApp::Pgp {
                active |= SecurityFlags::AUTOCRYPT;
            }
            if flags.intersects(active) {
                let prompt = format!("{} already selected. Clear and continue?", other.name());
                if prompter.confirm(&prompt, Answer::Yes) != Answer::Yes {
                    return Ok(false);
                }
                flags.remove(active);
            }
            flags.remove(other.flag());
            flags.insert(app.flag());
            if app == CryptoApp::Smime {
                flags.remove(SecurityFlags::AUTOCRYPT | SecurityFlags::AUTOCRYPT_OVERRIDE);
            }
            self.recompute(flags, envelope, options, crypto);
        }
        *flags = crypto.security_menu(app, *flags, envelope, prompter);
        enforce_exclusivity(flags, app);
        self.recompute(flags, envelope, options, crypto);
        log_debug(&format!("{} menu: {} -> {}", app.name(), old, flags));
        Ok(*flags != old)
    }

    /// Encrypt, clear or defer to the recommendation. A no-op unless
    /// Autocrypt is configured.
    pub fn autocrypt_menu(
        &mut self,
        flags: &mut SecurityFlags,
        envelope: &Envelope,
        options: &dyn ComposeOptions,
        crypto: &mut dyn CryptoBackend,
        prompter: &mut dyn Prompter,
    ) -> bool {
        if !options.autocrypt() {
            return false;
        }
        let old = *flags;
        if flags.contains(SecurityFlags::SMIME) {
            let active = SecurityFlags::ENCRYPT | SecurityFlags::SIGN;
            if flags.intersects(active) {
                let answer = prompter.confirm("S/MIME already selected. Clear and continue?", Answer::Yes);
                if answer != Answer::Yes {
                    return false;
                }
                flags.remove(active);
            }
            flags.remove(SecurityFlags::SMIME);
            flags.insert(SecurityFlags::PGP);
            self.recompute(flags, envelope, options, crypto);
        }

        // PGP stays selected even if the choice below is cancelled.
        flags.insert(SecurityFlags::PGP);
        match prompter.choose(AUTOCRYPT_PROMPT, AUTOCRYPT_LETTERS) {
            Some(0) => {
                flags.insert(SecurityFlags::AUTOCRYPT | SecurityFlags::AUTOCRYPT_OVERRIDE);
                flags.remove(
                    SecurityFlags::ENCRYPT
                        | SecurityFlags::SIGN
                        | SecurityFlags::OPPENCRYPT
                        | SecurityFlags::INLINE,
                );
            }
            Some(1) => {
                flags.remove(SecurityFlags::AUTOCRYPT);
                flags.insert(SecurityFlags::AUTOCRYPT_OVERRIDE);
            }
            Some(2) => {
                flags.remove(SecurityFlags::AUTOCRYPT_OVERRIDE);
                if options.opportunistic_encrypt() {
                    flags.insert(SecurityFlags::OPPENCRYPT);
                }
            }
            _ => {}
        }
        self.recompute(flags, envelope, options, crypto);
        log_debug(&format!("autocrypt menu: {} -> {}", old, flags));
        *flags != old
    }

    /// Last pass before the flags leave the session.
    pub fn finalize(&self, flags: &mut SecurityFlags, options: &dyn ComposeOptions) {
        if !options.autocrypt() {
            flags.remove(SecurityFlags::AUTOCRYPT);
        }
    }

    pub fn display(
        &self,
        flags: SecurityFlags,
        options: &dyn ComposeOptions,
        has_crypto: bool,
    ) -> SecurityDisplay {
        if !has_crypto {
            return SecurityDisplay::default();
        }
        let encrypt = flags.contains(SecurityFlags::ENCRYPT);
        let sign = flags.contains(SecurityFlags::SIGN);
        let mut main = match (sign, encrypt) {
            (true, true) => "Sign, Encrypt".to_string(),
            (false, true) => "Encrypt".to_string(),
            (true, false) => "Sign".to_string(),
            (false, false) => "None".to_string(),
        };
        if encrypt || sign {
            if flags.contains(SecurityFlags::PGP) {
                if flags.contains(SecurityFlags::INLINE) {
                    main.push_str(" (inline PGP)");
                } else {
                    main.push_str(" (PGP/MIME)");
                }
            } else if flags.contains(SecurityFlags::SMIME) {
                main.push_str(" (S/MIME)");
            }
        }
        if options.opportunistic_encrypt() && flags.contains(SecurityFlags::OPPENCRYPT) {
            main.push_str(" (OppEnc mode)");
        }

        let sign_as = if encrypt || sign {
            let configured = if flags.contains(SecurityFlags::SMIME) {
                options.smime_sign_as()
            } else {
                options.pgp_sign_as()
            };
            Some(configured.unwrap_or_else(|| "<default>".to_string()))
        } else {
            None
        };

        let autocrypt = if options.autocrypt() {
            let state = if flags.contains(SecurityFlags::AUTOCRYPT) {
                "Encrypt"
            } else {
                "Off"
            };
            Some(format!(
                "{}    Recommendation: {}",
                state,
                self.recommendation.label()
            ))
        } else {
            None
        };

        SecurityDisplay {
            main,
            sign_as,
            autocrypt,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use proptest::prelude::*;
    use ratcompose_core::{BodyPart, Envelope, Recommendation, SecurityFlags};

    use crate::collab_mod::{Answer, ComposeSettings, CryptoApp, CryptoBackend, Prompter};
    use crate::controller_mod::Op;
    use crate::error_mod::ComposeError;
    use crate::security_mod::{SecurityEngine, enforce_exclusivity};

    #[derive(Default)]
    struct Script {
        answers: Vec<Answer>,
        choices: Vec<usize>,
        confirms: Vec<String>,
    }

    impl Prompter for Script {
        fn next_op(&mut self) -> Option<Op> {
            None
        }
        fn line(&mut self, _prompt: &str, _initial: &str) -> Option<String> {
            None
        }
        fn confirm(&mut self, prompt: &str, default: Answer) -> Answer {
            self.confirms.push(prompt.to_string());
            if self.answers.is_empty() {
                default
            } else {
                self.answers.remove(0)
            }
        }
        fn choose(&mut self, _prompt: &str, _letters: &str) -> Option<usize> {
            if self.choices.is_empty() {
                None
            } else {
                Some(self.choices.remove(0))
            }
        }
        fn pick_files(&mut self, _prompt: &str) -> Option<Vec<PathBuf>> {
            None
        }
        fn select(&mut self, _prompt: &str, _items: &[String]) -> Option<Vec<usize>> {
            None
        }
        fn message(&mut self, _text: &str) {}
        fn error(&mut self, _text: &str) {}
    }

    /// Backend whose menu turns on the requested action bits.
    struct Backend {
        pgp: bool,
        smime: bool,
        menu_sets: SecurityFlags,
        recommendation: Recommendation,
        oppenc_sets: SecurityFlags,
    }

    impl Default for Backend {
        fn default() -> Self {
            Self {
                pgp: true,
                smime: true,
                menu_sets: SecurityFlags::empty(),
                recommendation: Recommendation::No,
                oppenc_sets: SecurityFlags::empty(),
            }
        }
    }

    impl CryptoBackend for Backend {
        fn has_application(&self, app: CryptoApp) -> bool {
            match app {
                CryptoApp::Pgp => self.pgp,
                CryptoApp::Smime => self.smime,
            }
        }
        fn opportunistic_encrypt(&mut self, flags: SecurityFlags, _env: &Envelope) -> SecurityFlags {
            flags | self.oppenc_sets
        }
        fn autocrypt_recommendation(&mut self, _env: &Envelope) -> Recommendation {
            self.recommendation
        }
        fn security_menu(
            &mut self,
            _app: CryptoApp,
            flags: SecurityFlags,
            _env: &Envelope,
            _prompter: &mut dyn Prompter,
        ) -> SecurityFlags {
            flags | self.menu_sets
        }
        fn make_key_attachment(
            &mut self,
            _prompter: &mut dyn Prompter,
        ) -> anyhow::Result<Option<BodyPart>> {
            Ok(None)
        }
        fn forget_passphrase(&mut self) {}
    }

    fn autocrypt_settings() -> ComposeSettings {
        ComposeSettings {
            autocrypt: true,
            ..ComposeSettings::default()
        }
    }

    #[test]
    fn recommendation_yes_turns_on_autocrypt_with_pgp() {
        let mut engine = SecurityEngine::new();
        let mut backend = Backend {
            recommendation: Recommendation::Yes,
            ..Backend::default()
        };
        let mut flags = SecurityFlags::SMIME | SecurityFlags::INLINE;
        // S/MIME is a manual choice and wins
        engine.recompute(&mut flags, &Envelope::default(), &autocrypt_settings(), &mut backend);
        assert!(!flags.contains(SecurityFlags::AUTOCRYPT));

        let mut flags = SecurityFlags::INLINE;
        engine.recompute(&mut flags, &Envelope::default(), &autocrypt_settings(), &mut backend);
        assert_eq!(flags, SecurityFlags::AUTOCRYPT | SecurityFlags::PGP);
        assert_eq!(engine.recommendation(), Recommendation::Yes);
    }

    #[test]
    fn manual_encrypt_clears_autocrypt_and_override() {
        let mut engine = SecurityEngine::new();
        let mut backend = Backend {
            recommendation: Recommendation::Yes,
            ..Backend::default()
        };
        let mut flags = SecurityFlags::ENCRYPT
            | SecurityFlags::PGP
            | SecurityFlags::AUTOCRYPT
            | SecurityFlags::AUTOCRYPT_OVERRIDE;
        engine.recompute(&mut flags, &Envelope::default(), &autocrypt_settings(), &mut backend);
        assert_eq!(flags, SecurityFlags::ENCRYPT | SecurityFlags::PGP);
    }

    #[test]
    fn override_keeps_recommendation_from_reenabling() {
        let mut engine = SecurityEngine::new();
        let mut backend = Backend {
            recommendation: Recommendation::Yes,
            ..Backend::default()
        };
        let mut flags = SecurityFlags::PGP | SecurityFlags::AUTOCRYPT_OVERRIDE;
        engine.recompute(&mut flags, &Envelope::default(), &autocrypt_settings(), &mut backend);
        assert!(!flags.contains(SecurityFlags::AUTOCRYPT));
    }

    #[test]
    fn opportunistic_encrypt_asks_backend() {
        let mut engine = SecurityEngine::new();
        let mut backend = Backend {
            oppenc_sets: SecurityFlags::ENCRYPT,
            ..Backend::default()
        };
        let settings = ComposeSettings {
            opportunistic_encrypt: true,
            ..ComposeSettings::default()
        };
        let mut flags = SecurityFlags::PGP | SecurityFlags::OPPENCRYPT;
        engine.recompute(&mut flags, &Envelope::default(), &settings, &mut backend);
        assert!(flags.contains(SecurityFlags::ENCRYPT));
        let shown = engine.display(flags, &settings, true);
        assert_eq!(shown.main, "Encrypt (PGP/MIME) (OppEnc mode)");
        assert_eq!(shown.sign_as.as_deref(), Some("<default>"));
    }

    #[test]
    fn missing_backend_is_reported() {
        let mut engine = SecurityEngine::new();
        let mut backend = Backend {
            smime: false,
            ..Backend::default()
        };
        let mut flags = SecurityFlags::empty();
        let mut script = Script::default();
        let err = engine.smime_menu(
            &mut flags,
            &Envelope::default(),
            &ComposeSettings::default(),
            &mut backend,
            &mut script,
        );
        assert_eq!(err, Err(ComposeError::NoBackend("S/MIME")));
        assert_eq!(
            ComposeError::NoBackend("PGP").to_string(),
            "No PGP backend configured"
        );
    }

    #[test]
    fn declining_switch_from_smime_leaves_flags() -> Result<(), ComposeError> {
        let mut engine = SecurityEngine::new();
        let mut backend = Backend::default();
        let mut flags = SecurityFlags::SMIME | SecurityFlags::SIGN;
        let mut script = Script {
            answers: vec![Answer::No],
            ..Script::default()
        };
        let changed = engine.pgp_menu(
            &mut flags,
            &Envelope::default(),
            &ComposeSettings::default(),
            &mut backend,
            &mut script,
        )?;
        assert!(!changed);
        assert_eq!(flags, SecurityFlags::SMIME | SecurityFlags::SIGN);
        assert_eq!(
            script.confirms,
            vec!["S/MIME already selected. Clear and continue?".to_string()]
        );
        Ok(())
    }

    #[test]
    fn accepting_switch_moves_to_pgp_and_runs_backend_menu() -> Result<(), ComposeError> {
        let mut engine = SecurityEngine::new();
        let mut backend = Backend {
            menu_sets: SecurityFlags::ENCRYPT,
            ..Backend::default()
        };
        let mut flags = SecurityFlags::SMIME | SecurityFlags::SIGN;
        let mut script = Script::default();
        let changed = engine.pgp_menu(
            &mut flags,
            &Envelope::default(),
            &ComposeSettings::default(),
            &mut backend,
            &mut script,
        )?;
        assert!(changed);
        assert_eq!(flags, SecurityFlags::PGP | SecurityFlags::ENCRYPT);
        Ok(())
    }

    #[test]
    fn autocrypt_encrypt_then_declined_smime_keeps_flags() -> Result<(), ComposeError> {
        let mut engine = SecurityEngine::new();
        let mut backend = Backend::default();
        let settings = autocrypt_settings();
        let env = Envelope::default();
        let mut flags = SecurityFlags::ENCRYPT | SecurityFlags::SIGN | SecurityFlags::INLINE;
        let mut script = Script {
            choices: vec![0],
            answers: vec![Answer::No],
            ..Script::default()
        };
        assert!(engine.autocrypt_menu(&mut flags, &env, &settings, &mut backend, &mut script));
        let forced =
            SecurityFlags::AUTOCRYPT | SecurityFlags::AUTOCRYPT_OVERRIDE | SecurityFlags::PGP;
        assert_eq!(flags, forced);

        let changed = engine.smime_menu(&mut flags, &env, &settings, &mut backend, &mut script)?;
        assert!(!changed);
        assert_eq!(flags, forced);
        assert_eq!(
            script.confirms,
            vec!["PGP already selected. Clear and continue?".to_string()]
        );
        Ok(())
    }

    #[test]
    fn autocrypt_clear_and_automatic_choices() {
        let mut engine = SecurityEngine::new();
        let mut backend = Backend::default();
        let settings = ComposeSettings {
            autocrypt: true,
            opportunistic_encrypt: true,
            ..ComposeSettings::default()
        };
        let env = Envelope::default();
        let mut flags = SecurityFlags::PGP | SecurityFlags::AUTOCRYPT;
        let mut script = Script {
            choices: vec![1, 2],
            ..Script::default()
        };
        engine.autocrypt_menu(&mut flags, &env, &settings, &mut backend, &mut script);
        assert_eq!(flags, SecurityFlags::PGP | SecurityFlags::AUTOCRYPT_OVERRIDE);
        engine.autocrypt_menu(&mut flags, &env, &settings, &mut backend, &mut script);
        assert_eq!(flags, SecurityFlags::PGP | SecurityFlags::OPPENCRYPT);
    }

    #[test]
    fn cancelled_autocrypt_choice_still_selects_pgp() {
        let mut engine = SecurityEngine::new();
        let mut backend = Backend::default();
        let mut flags = SecurityFlags::empty();
        let mut script = Script::default();
        let changed = engine.autocrypt_menu(
            &mut flags,
            &Envelope::default(),
            &autocrypt_settings(),
            &mut backend,
            &mut script,
        );
        assert!(changed);
        assert_eq!(flags, SecurityFlags::PGP);
    }

    #[test]
    fn autocrypt_menu_is_ignored_when_not_configured() {
        let mut engine = SecurityEngine::new();
        let mut backend = Backend::default();
        let mut flags = SecurityFlags::empty();
        let mut script = Script {
            choices: vec![0],
            ..Script::default()
        };
        let changed = engine.autocrypt_menu(
            &mut flags,
            &Envelope::default(),
            &ComposeSettings::default(),
            &mut backend,
            &mut script,
        );
        assert!(!changed);
        assert_eq!(script.choices, vec![0]);
    }

    #[test]
    fn finalize_drops_autocrypt_without_config() {
        let engine = SecurityEngine::new();
        let mut flags = SecurityFlags::AUTOCRYPT | SecurityFlags::PGP;
        engine.finalize(&mut flags, &ComposeSettings::default());
        assert_eq!(flags, SecurityFlags::PGP);
    }

    #[test]
    fn display_lines_for_smime_signing() {
        let engine = SecurityEngine::new();
        let settings = ComposeSettings {
            smime_sign_as: Some("0xABCD".to_string()),
            autocrypt: true,
            ..ComposeSettings::default()
        };
        let flags = SecurityFlags::SMIME | SecurityFlags::SIGN;
        let shown = engine.display(flags, &settings, true);
        assert_eq!(shown.main, "Sign (S/MIME)");
        assert_eq!(shown.sign_as.as_deref(), Some("0xABCD"));
        assert_eq!(
            shown.autocrypt.as_deref(),
            Some("Off    Recommendation: Off")
        );
        assert_eq!(engine.display(flags, &settings, false).main, "");
    }

    #[derive(Debug, Clone, Copy)]
    enum Menu {
        Pgp,
        Smime,
        Autocrypt,
        Recompute,
    }

    #[derive(Debug, Clone)]
    struct Step {
        menu: Menu,
        answer: Answer,
        choice: Option<usize>,
        menu_sets: u16,
        oppenc_sets: u16,
        recommendation: Recommendation,
    }

    fn step() -> impl Strategy<Value = Step> {
        let menu = prop_oneof![
            Just(Menu::Pgp),
            Just(Menu::Smime),
            Just(Menu::Autocrypt),
            Just(Menu::Recompute),
        ];
        let answer = prop_oneof![Just(Answer::Yes), Just(Answer::No), Just(Answer::Abort)];
        let recommendation = prop_oneof![
            Just(Recommendation::Off),
            Just(Recommendation::No),
            Just(Recommendation::Discouraged),
            Just(Recommendation::Available),
            Just(Recommendation::Yes),
        ];
        (
            menu,
            answer,
            proptest::option::of(0..4usize),
            any::<u16>(),
            any::<u16>(),
            recommendation,
        )
            .prop_map(
                |(menu, answer, choice, menu_sets, oppenc_sets, recommendation)| Step {
                    menu,
                    answer,
                    choice,
                    menu_sets,
                    oppenc_sets,
                    recommendation,
                },
            )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn pgp_and_smime_never_coexist(
            start in any::<u16>(),
            autocrypt in any::<bool>(),
            opportunistic_encrypt in any::<bool>(),
            pgp in any::<bool>(),
            smime in any::<bool>(),
            steps in proptest::collection::vec(step(), 1..30),
        ) {
            let settings = ComposeSettings {
                autocrypt,
                opportunistic_encrypt,
                ..ComposeSettings::default()
            };
            let env = Envelope::default();
            let mut engine = SecurityEngine::new();
            let mut flags = SecurityFlags::from_bits_truncate(start);
            enforce_exclusivity(&mut flags, CryptoApp::Pgp);

            for step in steps {
                let mut backend = Backend {
                    pgp,
                    smime,
                    menu_sets: SecurityFlags::from_bits_truncate(step.menu_sets),
                    recommendation: step.recommendation,
                    oppenc_sets: SecurityFlags::from_bits_truncate(step.oppenc_sets),
                };
                let mut script = Script {
                    answers: vec![step.answer],
                    choices: step.choice.into_iter().collect(),
                    ..Script::default()
                };
                match step.menu {
                    Menu::Pgp => {
                        let _ = engine.pgp_menu(&mut flags, &env, &settings, &mut backend, &mut script);
                    }
                    Menu::Smime => {
                        let _ = engine.smime_menu(&mut flags, &env, &settings, &mut backend, &mut script);
                    }
                    Menu::Autocrypt => {
                        engine.autocrypt_menu(&mut flags, &env, &settings, &mut backend, &mut script);
                    }
                    Menu::Recompute => engine.recompute(&mut flags, &env, &settings, &mut backend),
                }
                prop_assert!(
                    !flags.contains(SecurityFlags::PGP | SecurityFlags::SMIME),
                    "both applications set after {:?}: {}",
                    step.menu,
                    flags
                );
                prop_assert!(
                    !flags.contains(SecurityFlags::SMIME | SecurityFlags::AUTOCRYPT),
                    "autocrypt under S/MIME after {:?}: {}",
                    step.menu,
                    flags
                );
            }
        }
    }
}
