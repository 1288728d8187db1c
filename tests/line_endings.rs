use std::path::Path;
use vfxbin::ops::{self, CancelFlag};
use vfxbin::{ConditionMode, Document, EditSession, EditorConfig, LineEnding, PersistentCondition, conditions};

const ORB: &str = "Characters/Ahri/Skins/Skin0/Particles/Ahri_Base_Orb_Mis";
const TAIL: &str = "Characters/Ahri/Skins/Skin0/Particles/Ahri_Base_Tail_Idle";

fn fixture() -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("skin0.py");
    std::fs::read_to_string(path).expect("read fixture")
}

fn assert_all_lf_are_crlf(bytes: &[u8]) {
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'\n' {
            assert!(i > 0 && bytes[i - 1] == b'\r', "found bare LF at {i}");
        }
    }
}

#[test]
fn crlf_document_stays_crlf_through_edits() {
    let doc = Document::from_text(fixture().replace('\n', "\r\n"));
    assert_eq!(doc.line_ending, LineEnding::CrLf);
    let donor = Document::from_text(fixture());
    assert_eq!(donor.line_ending, LineEnding::Lf);

    let doc = ops::create_system(&doc, "Characters/Ahri/Skins/Skin0/Particles/Ahri_New")
        .expect("create")
        .document;
    let doc = ops::port_all_emitters(
        &doc,
        "Characters/Ahri/Skins/Skin0/Particles/Ahri_New",
        &donor,
        ORB,
        &CancelFlag::new(),
        |_| {},
    )
    .expect("port all")
    .document;
    let doc = conditions::add_persistent_effect(
        &doc,
        TAIL,
        None,
        &PersistentCondition::BuffActive("AhriR".to_string()),
        ConditionMode::Add,
    )
    .expect("persistent effect")
    .document;
    let doc = conditions::add_child_particle(&doc, ORB, TAIL, None, ConditionMode::Add)
        .expect("child particle")
        .document;
    let doc = ops::rename_system(&doc, ORB, "Characters/Ahri/Skins/Skin0/Particles/Ahri_Orb")
        .expect("rename")
        .document;

    assert_eq!(
        doc.tree
            .system("Characters/Ahri/Skins/Skin0/Particles/Ahri_New")
            .expect("new system")
            .emitter_names(),
        vec!["Orb_Core", "Orb_Trail", "Sparkles {rare}"]
    );
    assert_all_lf_are_crlf(doc.text.as_bytes());
}

#[test]
fn mostly_lf_document_gets_lf_edits() {
    let text = fixture().replacen("\n", "\r\n", 1);
    let doc = Document::from_text(text);
    assert_eq!(doc.line_ending, LineEnding::Lf);

    let edit = ops::move_emitter(&doc, ORB, "Orb_Core", TAIL).expect("move");
    let edit = ops::create_system(&edit.document, "Fx_Extra").expect("create");
    assert_eq!(edit.document.text.matches('\r').count(), 1);
    assert!(edit.document.text.starts_with("#PROP_text\r\n"));
}

#[test]
fn saved_crlf_file_has_no_bare_lf() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("skin0.py");
    std::fs::write(&path, fixture().replace('\n', "\r\n")).expect("write");

    let mut session = EditSession::new(EditorConfig::default());
    session.open(&path).expect("open");
    assert!(session.add_idle_particle(ORB, Some("R_Hand"), ConditionMode::Add).is_applied());
    assert!(session.delete_emitter(TAIL, "Tail_Glow").is_applied());
    session.save(None).expect("save");

    let bytes = std::fs::read(&path).expect("read back");
    assert_all_lf_are_crlf(&bytes);
    let text = String::from_utf8(bytes).expect("utf8");
    assert!(text.contains("boneName: string = \"R_Hand\"\r\n"));
    assert!(text.contains("complexEmitterDefinitionData: list[pointer] = {}\r\n"));
}
