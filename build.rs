use std::collections::HashSet;
use std::path::Path;

fn main() {
    let catalog_path = Path::new("catalogs/datasets.json");
    validate_catalog_file(catalog_path);
    set_build_dependencies();
}

fn validate_catalog_file(catalog_path: &Path) {
    // Ensure catalog exists at build time
    assert!(
        catalog_path.exists(),
        "\n\nCATALOG BUILD ERROR: File not found\n\
         Path: {}\n\
         Please create the dataset catalog before building.\n",
        catalog_path.display()
    );

    let catalog_contents = std::fs::read_to_string(catalog_path).unwrap_or_else(|e| {
        panic!(
            "\n\nCATALOG BUILD ERROR: Failed to read file\n\
             Path: {}\n\
             Error: {e}\n",
            catalog_path.display()
        );
    });

    let catalog: serde_json::Value = serde_json::from_str(&catalog_contents).unwrap_or_else(|e| {
        panic!(
            "\n\nCATALOG BUILD ERROR: Invalid JSON\n\
             Path: {}\n\
             Error: {e}\n\
             Hint: Check for missing commas, brackets, or invalid syntax.\n",
            catalog_path.display()
        );
    });

    validate_catalog_structure(&catalog);
}

fn validate_catalog_structure(catalog: &serde_json::Value) {
    assert!(
        catalog.is_object(),
        "\n\nCATALOG BUILD ERROR: Root must be a JSON object\n\
         Got: {catalog}\n"
    );

    let datasets = catalog.get("datasets").unwrap_or_else(|| {
        panic!(
            "\n\nCATALOG BUILD ERROR: Missing 'datasets' field\n\
             The catalog must have a top-level 'datasets' array.\n"
        );
    });

    let datasets = datasets.as_array().unwrap_or_else(|| {
        panic!(
            "\n\nCATALOG BUILD ERROR: 'datasets' must be an array\n\
             Got: {datasets}\n"
        );
    });

    let names = validate_datasets(datasets);
    validate_children(datasets, &names);

    println!(
        "cargo:warning=Validated dataset catalog: {} datasets",
        datasets.len()
    );
}

fn validate_datasets(datasets: &[serde_json::Value]) -> HashSet<String> {
    let mut names = HashSet::new();

    for (i, dataset) in datasets.iter().enumerate() {
        let name = dataset
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_else(|| {
                panic!("\n\nCATALOG BUILD ERROR: Dataset at index {i} missing 'name' field\n")
            });

        assert!(
            dataset.get("title").is_some(),
            "\n\nCATALOG BUILD ERROR: Dataset '{name}' (index {i}) missing 'title' field\n"
        );

        assert!(
            names.insert(name.to_string()),
            "\n\nCATALOG BUILD ERROR: Dataset '{name}' is defined more than once\n"
        );
    }

    names
}

fn validate_children(datasets: &[serde_json::Value], names: &HashSet<String>) {
    for dataset in datasets {
        let name = dataset
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("<unknown>");

        let Some(children) = dataset.get("children").and_then(|c| c.as_array()) else {
            continue;
        };

        for child in children {
            let child = child.as_str().unwrap_or("<invalid>");
            assert!(
                names.contains(child),
                "\n\nCATALOG BUILD ERROR: Dataset '{name}' lists unknown child '{child}'\n"
            );
        }
    }
}

fn set_build_dependencies() {
    // Tell cargo to rerun if catalog changes
    println!("cargo:rerun-if-changed=catalogs/datasets.json");

    // Tell cargo to rerun if build.rs changes
    println!("cargo:rerun-if-changed=build.rs");
}
