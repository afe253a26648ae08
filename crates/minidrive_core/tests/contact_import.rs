use minidrive_core::db::open_db_in_memory;
use minidrive_core::{
    parse_document, CommType, ContactRepository, ImportError, ImportService, RepoError,
    SqliteContactRepository, StanzaError,
};
use rusqlite::Connection;

const ADDRESS_BOOK: &str = include_str!("fixtures/address_book.vcf");

#[test]
fn fixture_imports_every_stanza_in_order() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&mut conn).unwrap();
    let mut service = ImportService::new(repo);

    let report = service.import_document("martine", ADDRESS_BOOK).unwrap();
    assert_eq!(report.imported_count, 3);
    assert_eq!(report.contacts.len(), 3);
    assert_eq!(report.records.len(), 3);

    let martine = &report.contacts[0];
    assert_eq!(martine.first_name.as_deref(), Some("Martine"));
    assert_eq!(martine.last_name.as_deref(), Some("Rogge"));
    assert_eq!(
        martine.address.as_deref(),
        Some("Hatice-Jäntsch-Ring 3180, Vilsbiburg, 02406, Germany")
    );
    assert_eq!(martine.communications.len(), 2);
    assert_eq!(martine.communications[0].comm_type, CommType::Phone);
    assert_eq!(martine.communications[0].label, "cell,voice");
    assert_eq!(martine.communications[1].label, "internet,home");

    let prince = &report.contacts[1];
    assert_eq!(prince.first_name.as_deref(), Some("Prince"));
    assert_eq!(prince.last_name, None);
    assert_eq!(prince.company.as_deref(), Some("Paisley Park Records"));
    assert_eq!(
        prince.notes.as_deref(),
        Some("Prefers email, not calls.\nAsk for the studio line.")
    );
    let labels: Vec<_> = prince
        .communications
        .iter()
        .map(|comm| comm.label.as_str())
        .collect();
    assert_eq!(labels, vec!["phone", "work", "email"]);

    let acme = &report.contacts[2];
    assert_eq!(acme.first_name, None);
    assert_eq!(acme.company.as_deref(), Some("Acme Logistics GmbH"));
    assert_eq!(acme.address.as_deref(), Some("Hauptstr. 1, Berlin, Germany"));
    assert_eq!(
        acme.notes.as_deref(),
        Some("Folded notes are joined back together on import.")
    );

    let stored = service.repository().list_contacts("martine").unwrap();
    let stored_names: Vec<_> = stored
        .iter()
        .map(|record| record.first_name.clone().or(record.company.clone()))
        .collect();
    assert_eq!(
        stored_names,
        vec![
            Some("Martine".to_string()),
            Some("Prince".to_string()),
            Some("Acme Logistics GmbH".to_string()),
        ]
    );
    assert_eq!(stored[1].communications.len(), 3);
    assert_eq!(stored[1].communications[2].comm_type, CommType::Email);
}

#[test]
fn committed_records_carry_storage_identity() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&mut conn).unwrap();
    let mut service = ImportService::new(repo);

    let report = service.import_document("owner-a", ADDRESS_BOOK).unwrap();
    let batch_id = report.records[0].import_batch_id;
    assert!(batch_id.is_some());
    for record in &report.records {
        assert_eq!(record.owner, "owner-a");
        assert_eq!(record.import_batch_id, batch_id);
        assert!(record.created_at > 0);
        for comm in &record.communications {
            assert_eq!(comm.contact_id, record.id);
        }
    }

    let loaded = service
        .repository()
        .get_contact(report.records[0].id)
        .unwrap()
        .unwrap();
    assert_eq!(loaded, report.records[0]);
}

#[test]
fn rejected_stanza_rolls_back_the_whole_batch() {
    let doc = "BEGIN:VCARD\nFN:First Person\nTEL:1\nEND:VCARD\n\
               BEGIN:VCARD\nFN:Second Person\nEMAIL:s@example.org\nEND:VCARD\n\
               BEGIN:VCARD\nVERSION:3.0\nTEL:only a number\nEND:VCARD\n";

    let mut conn = open_db_in_memory().unwrap();
    {
        let repo = SqliteContactRepository::try_new(&mut conn).unwrap();
        let mut service = ImportService::new(repo);
        let err = service.import_document("bob", doc).unwrap_err();

        assert_eq!(err.stanza_index(), Some(2));
        match err {
            ImportError::Persist {
                index: Some(2),
                source: RepoError::RecordRejected { index: 2, .. },
            } => {}
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(service.repository().count_contacts("bob").unwrap(), 0);
    }

    assert_eq!(row_count(&conn, "contacts"), 0);
    assert_eq!(row_count(&conn, "communications"), 0);
    assert_eq!(row_count(&conn, "import_batches"), 0);
}

#[test]
fn failed_batch_leaves_earlier_imports_untouched() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&mut conn).unwrap();
    let mut service = ImportService::new(repo);

    service.import_document("carol", ADDRESS_BOOK).unwrap();
    let bad = "BEGIN:VCARD\nFN:Fine\nEND:VCARD\nBEGIN:VCARD\nNOTE:nameless\nEND:VCARD\n";
    assert!(service.import_document("carol", bad).is_err());

    assert_eq!(service.repository().count_contacts("carol").unwrap(), 3);
}

#[test]
fn unreadable_stanza_never_reaches_storage() {
    let doc = "BEGIN:VCARD\nFN:Ok Person\nEND:VCARD\nBEGIN:VCARD\nFN:Broken\ngarbage line\nEND:VCARD\n";
    let mut conn = open_db_in_memory().unwrap();
    {
        let repo = SqliteContactRepository::try_new(&mut conn).unwrap();
        let mut service = ImportService::new(repo);
        let err = service.import_document("dave", doc).unwrap_err();
        assert!(matches!(err, ImportError::Stanza { index: 1, .. }));
        assert!(err.to_string().contains("stanza 1"));
    }
    assert_eq!(row_count(&conn, "import_batches"), 0);
}

#[test]
fn stanza_without_optional_fields_normalizes_to_empty() {
    let contacts = parse_document("BEGIN:VCARD\r\nVERSION:3.0\r\nEND:VCARD\r\n").unwrap();
    assert_eq!(contacts.len(), 1);
    let contact = &contacts[0];
    assert_eq!(contact.first_name, None);
    assert_eq!(contact.last_name, None);
    assert_eq!(contact.company, None);
    assert_eq!(contact.notes, None);
    assert_eq!(contact.address, None);
    assert!(contact.communications.is_empty());
}

#[test]
fn n_stanzas_yield_n_contacts() {
    let doc: String = (0..25)
        .map(|i| format!("BEGIN:VCARD\nFN:Person {i}\nEND:VCARD\n"))
        .collect();
    let contacts = parse_document(&doc).unwrap();
    assert_eq!(contacts.len(), 25);
    for (i, contact) in contacts.iter().enumerate() {
        assert_eq!(contact.last_name.as_deref(), Some(i.to_string().as_str()));
    }
}

#[test]
fn byte_order_mark_does_not_drop_first_contact() {
    let doc = "\u{feff}BEGIN:VCARD\r\nFN:Ada Lovelace\r\nEND:VCARD\r\n\
               BEGIN:VCARD\r\nFN:Grace Hopper\r\nEND:VCARD\r\n";
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&mut conn).unwrap();
    let mut service = ImportService::new(repo);

    let report = service.import_document("erin", doc).unwrap();
    assert_eq!(report.imported_count, 2);
    assert_eq!(report.contacts[0].first_name.as_deref(), Some("Ada"));
    assert_eq!(report.contacts[1].first_name.as_deref(), Some("Grace"));
}

#[test]
fn embedded_agent_card_keeps_outer_contact_whole() {
    let doc = "BEGIN:VCARD\nVERSION:2.1\nFN:Boss Person\nAGENT:\n\
               BEGIN:VCARD\nFN:Assistant Person\nTEL:111\nEND:VCARD\n\
               TEL:555\nEND:VCARD\n";
    let contacts = parse_document(doc).unwrap();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].first_name.as_deref(), Some("Boss"));
    let values: Vec<_> = contacts[0]
        .communications
        .iter()
        .map(|comm| comm.value.as_str())
        .collect();
    assert_eq!(values, vec!["555"]);
}

#[test]
fn unreadable_line_is_named_in_the_error() {
    let err = parse_document("BEGIN:VCARD\nFN:Ok\nnot a field\nEND:VCARD\n").unwrap_err();
    match &err {
        ImportError::Stanza {
            index: 0,
            source: StanzaError::MalformedLine { line, content, .. },
        } => {
            assert_eq!(*line, 2);
            assert_eq!(content, "not a field");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("`not a field`"));
}

#[test]
fn normalized_contacts_serialize_with_snake_case_kinds() {
    let contacts =
        parse_document("BEGIN:VCARD\nFN:Ann Lee\nTEL;TYPE=HOME:1\nEND:VCARD\n").unwrap();
    let json = serde_json::to_value(&contacts[0]).unwrap();
    assert_eq!(json["first_name"], "Ann");
    assert_eq!(json["communications"][0]["comm_type"], "phone");
    assert_eq!(json["communications"][0]["label"], "home");
}

fn row_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}
