use std::sync::Arc;

use appcatalog::catalog::{
    ApplicationId, ApplicationService, DictOptions, MemoryCatalogStore, MemorySearchIndex,
    OwnershipRepository, Record, SeedData, UserId,
};
use serde_json::{json, Value};

fn seed() -> SeedData {
    serde_json::from_value(json!({
        "organizations": [
            {"id": 1, "value": "DGFiP"},
            {"id": 2, "value": "Insee"}
        ],
        "users": [
            {"id": 1, "email": "etienne.zola@dgfip.finances.gouv.fr", "first_name": "Étienne", "last_name": "Zola"},
            {"id": 2, "email": "emile.ecoffey@insee.fr", "first_name": "Émile", "last_name": "Écoffey"},
            {"id": 3, "email": "anne.dupont@insee.fr", "first_name": "Anne", "last_name": "Dupont"}
        ],
        "data_sources": [
            {"id": 1, "name": "Fichier des impôts", "application_id": 1},
            {"id": 2, "name": "Annuaire des agents", "application_id": 1, "origin_application_id": 2}
        ]
    }))
    .expect("seed parses")
}

fn record(value: Value) -> Record {
    let Value::Object(map) = value else {
        panic!("object expected");
    };
    let mut record = Record::from_json(map).expect("record converts");
    record.parse_validation_date();
    record
}

type Service = ApplicationService<MemoryCatalogStore, MemorySearchIndex>;

fn service() -> (Service, Arc<MemoryCatalogStore>) {
    let store = Arc::new(MemoryCatalogStore::from_seed(seed()));
    let service = ApplicationService::new(store.clone(), Arc::new(MemorySearchIndex::new()));
    (service, store)
}

#[test]
fn catalog_lifecycle_from_creation_to_bulk_delete() {
    let (service, store) = service();

    let fiscal = service
        .create(&record(json!({
            "name": "Ficoba",
            "organization_name": "DGFiP",
            "goals": "Recenser les comptes bancaires",
            "monthly_connection_count": 0,
            "validation_date": "12/01/2022",
            "owners": [1, 2, 3]
        })))
        .expect("fiscal application created");
    let statistics = service
        .create(&record(json!({
            "name": "Sirene",
            "organization_name": "Insee",
            "goals": "Identifier les établissements",
            "owners": [{"id": 3}]
        })))
        .expect("statistics application created");
    assert_eq!(fiscal.id(), Some(ApplicationId(1)));
    assert_eq!(store.count().expect("ownership count"), 4);

    let rendered = service
        .render(
            &service.get(ApplicationId(1)).expect("stored"),
            DictOptions {
                populate_data_sources: true,
                populate_owners: true,
            },
        )
        .expect("rendered");
    let last_names: Vec<&str> = rendered["owners"]
        .as_array()
        .expect("owners array")
        .iter()
        .filter_map(|owner| owner["last_name"].as_str())
        .collect();
    assert_eq!(last_names, vec!["Dupont", "Écoffey", "Zola"]);
    let sources: Vec<&str> = rendered["data_sources"]
        .as_array()
        .expect("data sources array")
        .iter()
        .filter_map(|source| source["name"].as_str())
        .collect();
    assert_eq!(sources, vec!["Annuaire des agents", "Fichier des impôts"]);
    assert_eq!(rendered["monthly_connection_count"], json!(0));
    assert_eq!(rendered["validation_date"], json!("12/01/2022"));

    let statistics_id = statistics.id().expect("id");
    service
        .update(
            statistics_id,
            &record(json!({
                "name": "Sirene",
                "organization_name": "Insee",
                "goals": "Identifier les établissements",
                "operator_count": 0,
                "historic": "1973",
                "owners": []
            })),
        )
        .expect("statistics application updated");
    let updated = service.get(statistics_id).expect("stored");
    assert!(updated.owners().is_empty());
    assert_eq!(updated.operator_count(), None);
    assert_eq!(updated.historic(), Some(1973));
    assert_eq!(store.owners_of(statistics_id).expect("owners"), Vec::<UserId>::new());

    assert_eq!(service.search("etablissements").expect("search").len(), 1);

    assert_eq!(service.delete_all().expect("bulk delete"), 2);
    assert_eq!(store.count().expect("ownership count"), 0);
    assert!(service.search("sirene").expect("search").is_empty());
}

#[test]
fn export_feeds_a_fresh_catalog() {
    let (source, _) = service();
    source
        .create(&record(json!({
            "name": "Ficoba",
            "organization_name": "DGFiP",
            "goals": "Recenser les comptes bancaires",
            "access_url": "https://ficoba.dgfip.finances.gouv.fr",
            "context_email": "ficoba@dgfip.finances.gouv.fr",
            "owners": [2, 1]
        })))
        .expect("application created");

    let mut export = Vec::new();
    source.export_csv(&mut export).expect("export written");
    let text = String::from_utf8(export.clone()).expect("utf-8");
    assert!(text.contains("\"emile.ecoffey@insee.fr,etienne.zola@dgfip.finances.gouv.fr\""));

    let (target, target_store) = service();
    let report = target.import_csv(export.as_slice()).expect("import runs");
    assert!(report.is_clean());
    assert_eq!(target_store.count().expect("ownership count"), 2);
    assert_eq!(
        target.export_rows().expect("rows"),
        source.export_rows().expect("rows")
    );
}
