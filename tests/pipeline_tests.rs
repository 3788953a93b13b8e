use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use cvat2yolo::attributes::AttributeThresholds;
use cvat2yolo::config::{PrepareArgs, RatioArgs, RebalanceArgs};
use cvat2yolo::inventory::ImageInventory;
use cvat2yolo::io::{read_split_list, DatasetDescriptor};
use cvat2yolo::parser::parse_documents;
use cvat2yolo::{classify, process_dataset, rebalance_dataset, Category, DatasetError};

fn write_image(dir: &Path, name: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, format!("fake image bytes for {}", name)).unwrap();
    path
}

fn write_xml(dir: &Path, name: &str, images: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<annotations>\n  <version>1.1</version>\n{}</annotations>\n",
        images
    );
    fs::write(&path, xml).unwrap();
    path
}

fn image_entry(name: &str, boxes: &str) -> String {
    format!(
        "  <image id=\"0\" name=\"{}\" width=\"1000\" height=\"800\">\n{}  </image>\n",
        name, boxes
    )
}

fn box_entry(label: &str, coords: [f64; 4], attributes: &str) -> String {
    format!(
        "    <box label=\"{}\" occluded=\"0\" xtl=\"{}\" ytl=\"{}\" xbr=\"{}\" ybr=\"{}\" z_order=\"0\">{}</box>\n",
        label, coords[0], coords[1], coords[2], coords[3], attributes
    )
}

const VALID: [f64; 4] = [100.0, 50.0, 300.0, 200.0];

fn ratios() -> RatioArgs {
    RatioArgs {
        primary_per_unit: 1.0,
        secondary_per_unit: 1.0,
        negative_per_unit: 1.0,
    }
}

#[test]
fn zero_width_box_leaves_image_negative() {
    let temp_dir = tempfile::tempdir().unwrap();
    let images_dir = temp_dir.path().join("images");
    write_image(&images_dir, "a.jpg");
    let doc = write_xml(
        temp_dir.path(),
        "a.xml",
        &image_entry("a.jpg", &box_entry("step", [100.0, 50.0, 100.0, 200.0], "")),
    );

    let inventory = ImageInventory::scan(&images_dir).unwrap();
    let (annotations, stats) =
        parse_documents(&[doc], &inventory, &AttributeThresholds::default());

    assert!(annotations.is_empty());
    assert_eq!(stats.boxes_rejected_geometry, 1);
    assert_eq!(stats.boxes_accepted, 0);
    let image = &inventory.records()[0];
    assert_eq!(classify(annotations.get(image)), Category::Negative);
}

#[test]
fn short_step_is_filtered_by_attribute_threshold() {
    let temp_dir = tempfile::tempdir().unwrap();
    let images_dir = temp_dir.path().join("images");
    write_image(&images_dir, "a.jpg");
    write_image(&images_dir, "b.jpg");
    let doc = write_xml(
        temp_dir.path(),
        "a.xml",
        &[
            image_entry(
                "a.jpg",
                &box_entry(
                    "step",
                    VALID,
                    "<attribute name=\"height\">less than 3cm</attribute>",
                ),
            ),
            image_entry(
                "b.jpg",
                &box_entry(
                    "Stair",
                    VALID,
                    "<attribute name=\"height\">3cm to 7cm</attribute>",
                ),
            ),
        ]
        .concat(),
    );

    let thresholds = AttributeThresholds {
        min_step_height_cm: Some(3),
        ..Default::default()
    };
    let inventory = ImageInventory::scan(&images_dir).unwrap();
    let (annotations, stats) = parse_documents(&[doc], &inventory, &thresholds);

    assert_eq!(stats.boxes_rejected_attribute, 1);
    assert_eq!(stats.boxes_accepted, 1);
    assert_eq!(annotations.len(), 1);
    let (image, record) = annotations.iter().next().unwrap();
    assert_eq!(image.file_name(), "b.jpg");
    assert_eq!(classify(Some(record)), Category::Secondary);
}

#[test]
fn documents_merge_and_bad_entries_are_skipped() {
    let temp_dir = tempfile::tempdir().unwrap();
    let images_dir = temp_dir.path().join("images");
    write_image(&images_dir.join("site"), "a.jpg");
    write_image(&images_dir, "c.png");

    let first = write_xml(
        temp_dir.path(),
        "1.xml",
        &[
            image_entry("task/a.jpg", &box_entry("step", VALID, "")),
            image_entry("unknown.jpg", &box_entry("ramp", VALID, "")),
            image_entry("c.png", &box_entry("door", VALID, "")),
        ]
        .concat(),
    );
    let second = write_xml(
        temp_dir.path(),
        "2.xml",
        &[
            image_entry("a.jpg", &box_entry("ramp", VALID, "")),
            "  <image id=\"9\" name=\"c.png\" width=\"wide\" height=\"800\">\n  </image>\n"
                .to_string(),
        ]
        .concat(),
    );
    let broken = temp_dir.path().join("3.xml");
    fs::write(&broken, "<annotations><image name=").unwrap();

    let inventory = ImageInventory::scan(&images_dir).unwrap();
    let (annotations, stats) = parse_documents(
        &[first, broken, second],
        &inventory,
        &AttributeThresholds::default(),
    );

    assert_eq!(stats.documents_parsed, 2);
    assert_eq!(stats.documents_failed, 1);
    assert_eq!(stats.images_unmatched, 1);
    assert_eq!(stats.images_invalid, 1);
    assert_eq!(stats.boxes_ignored_label, 1);
    assert_eq!(stats.boxes_accepted, 2);

    assert_eq!(annotations.len(), 1);
    let (image, record) = annotations.iter().next().unwrap();
    assert_eq!(image.file_name(), "a.jpg");
    assert_eq!(record.boxes().len(), 2);
    assert_eq!(record.boxes()[0].class_id, 1);
    assert_eq!(record.boxes()[1].class_id, 0);
    assert_eq!(classify(Some(record)), Category::Primary);
}

#[test]
fn boxes_interleaved_with_other_shapes_are_kept() {
    let temp_dir = tempfile::tempdir().unwrap();
    let images_dir = temp_dir.path().join("images");
    write_image(&images_dir, "a.jpg");
    write_image(&images_dir, "b.jpg");
    let shapes = [
        box_entry("ramp", VALID, ""),
        "    <polygon label=\"door\" occluded=\"0\" points=\"1.0,2.0;30.0,4.0;5.0,60.0\" z_order=\"0\">\n    </polygon>\n".to_string(),
        box_entry("step", [10.0, 10.0, 60.0, 90.0], ""),
        "    <tag label=\"outdoor\" source=\"manual\">\n    </tag>\n".to_string(),
    ]
    .concat();
    let doc = write_xml(
        temp_dir.path(),
        "mixed.xml",
        &[
            image_entry("a.jpg", &shapes),
            image_entry("b.jpg", &box_entry("stair", VALID, "")),
        ]
        .concat(),
    );

    let inventory = ImageInventory::scan(&images_dir).unwrap();
    let (annotations, stats) =
        parse_documents(&[doc], &inventory, &AttributeThresholds::default());

    assert_eq!(stats.documents_parsed, 1);
    assert_eq!(stats.documents_failed, 0);
    assert_eq!(stats.boxes_accepted, 3);
    assert_eq!(annotations.len(), 2);
    let a = inventory.resolve("a.jpg").unwrap();
    let classes: Vec<_> = annotations[a].boxes().iter().map(|b| b.class_id).collect();
    assert_eq!(classes, vec![0, 1]);
}

#[test]
fn annotation_name_matches_image_case_insensitively() {
    let temp_dir = tempfile::tempdir().unwrap();
    let images_dir = temp_dir.path().join("images");
    write_image(&images_dir.join("cam"), "IMG_7.JPG");
    let doc = write_xml(
        temp_dir.path(),
        "a.xml",
        &image_entry("export/img_7.jpg", &box_entry("ramp", VALID, "")),
    );

    let inventory = ImageInventory::scan(&images_dir).unwrap();
    let (annotations, stats) =
        parse_documents(&[doc], &inventory, &AttributeThresholds::default());

    assert_eq!(stats.images_matched, 1);
    assert_eq!(stats.images_unmatched, 0);
    let (image, record) = annotations.iter().next().unwrap();
    assert_eq!(image.file_name(), "IMG_7.JPG");
    assert_eq!(classify(Some(record)), Category::Primary);
}

fn prepare_args(root: &Path, val_ratio: f64, seed: u64) -> PrepareArgs {
    PrepareArgs {
        images_dir: root.join("images"),
        xml_glob: format!("{}/ann/*.xml", root.display()),
        output_dir: root.join(format!("out{}", seed)),
        val_ratio,
        ratios: ratios(),
        min_ramp_width: None,
        min_step_height: None,
        seed: Some(seed),
    }
}

#[test]
fn duplicate_image_names_do_not_share_output() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let images_dir = root.join("images");
    write_image(&images_dir.join("s1"), "x.jpg");
    write_image(&images_dir.join("s2"), "x.jpg");
    write_image(&images_dir, "x.png");
    write_image(&images_dir, "y.jpg");
    write_image(&images_dir, "n.jpg");
    write_xml(
        &root.join("ann"),
        "task.xml",
        &[
            image_entry("s1/x.jpg", &box_entry("ramp", VALID, "")),
            image_entry("y.jpg", &box_entry("ramp", VALID, "")),
        ]
        .concat(),
    );

    for seed in 0..6 {
        let args = prepare_args(root, 0.5, seed);
        let report = process_dataset(&args).unwrap();

        assert_eq!(report.balance.available.total(), 3);
        let train: BTreeSet<_> = report.train.iter().collect();
        let val: BTreeSet<_> = report.val.iter().collect();
        assert!(train.is_disjoint(&val), "seed {}: {:?} / {:?}", seed, train, val);
        assert_eq!(train.len() + val.len(), 3);

        let label = fs::read_to_string(args.output_dir.join("labels").join("x.txt")).unwrap();
        assert!(label.starts_with("0 "), "seed {}: label {:?}", seed, label);
    }
}

#[test]
fn process_dataset_balances_ten_thirty_five() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let images_dir = root.join("images");
    let mut entries = String::new();
    for i in 0..10 {
        let name = format!("r{}.jpg", i);
        write_image(&images_dir, &name);
        entries.push_str(&image_entry(&name, &box_entry("ramp", VALID, "")));
    }
    for i in 0..30 {
        let name = format!("b{}.jpg", i);
        write_image(&images_dir, &name);
        entries.push_str(&image_entry(&name, &box_entry("step", VALID, "")));
    }
    for i in 0..5 {
        write_image(&images_dir, &format!("n{}.jpg", i));
    }
    write_xml(&root.join("ann"), "task.xml", &entries);

    let args = prepare_args(root, 0.2, 3);
    let report = process_dataset(&args).unwrap();

    assert_eq!(report.balance.available.primary, 10);
    assert_eq!(report.balance.available.secondary, 30);
    assert_eq!(report.balance.available.negative, 5);
    assert_eq!(report.balance.kept.primary, 10);
    assert_eq!(report.balance.kept.secondary, 10);
    assert_eq!(report.balance.kept.negative, 5);
    assert_eq!(report.val.len(), 5);
    assert_eq!(report.train.len(), 20);

    let selected: BTreeSet<_> = report.train.iter().chain(&report.val).collect();
    assert_eq!(selected.len(), 25);
    let name_of = |p: &&PathBuf| p.file_name().unwrap().to_str().unwrap().to_string();
    let names: Vec<_> = selected.iter().map(name_of).collect();
    assert_eq!(names.iter().filter(|n| n.starts_with('r')).count(), 10);
    assert_eq!(names.iter().filter(|n| n.starts_with('n')).count(), 5);
}

struct Workspace {
    _temp_dir: tempfile::TempDir,
    args: PrepareArgs,
}

fn prepare_workspace(with_ramps: bool) -> Workspace {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let images_dir = root.join("images");
    for name in ["r1.jpg", "r2.jpg", "b1.jpg", "b2.jpg", "b3.jpg", "n1.jpg"] {
        write_image(&images_dir, name);
    }
    write_image(&images_dir.join("nested"), "n2.png");
    fs::write(images_dir.join("notes.txt"), "not an image").unwrap();

    let ramp_label = if with_ramps { "ramp" } else { "handrail" };
    write_xml(
        &root.join("ann"),
        "task.xml",
        &[
            image_entry(
                "r1.jpg",
                &[box_entry(ramp_label, VALID, ""), box_entry("step", [10.0, 10.0, 60.0, 90.0], "")]
                    .concat(),
            ),
            image_entry("r2.jpg", &box_entry(ramp_label, [500.0, 400.0, 900.0, 700.0], "")),
            image_entry("b1.jpg", &box_entry("step", VALID, "")),
            image_entry("b2.jpg", &box_entry("stair", VALID, "")),
            image_entry("b3.jpg", &box_entry("stair", VALID, "")),
        ]
        .concat(),
    );

    let args = PrepareArgs {
        images_dir,
        xml_glob: format!("{}/ann/*.xml", root.display()),
        output_dir: root.join("out"),
        val_ratio: 0.2,
        ratios: ratios(),
        min_ramp_width: None,
        min_step_height: None,
        seed: Some(7),
    };
    Workspace {
        _temp_dir: temp_dir,
        args,
    }
}

#[test]
fn process_dataset_writes_balanced_layout() {
    let workspace = prepare_workspace(true);
    let args = &workspace.args;
    let report = process_dataset(args).unwrap();

    assert_eq!(report.balance.available.primary, 2);
    assert_eq!(report.balance.available.secondary, 3);
    assert_eq!(report.balance.available.negative, 2);
    assert_eq!(report.balance.kept.primary, 2);
    assert_eq!(report.balance.kept.secondary, 2);
    assert_eq!(report.balance.kept.negative, 2);
    assert_eq!(report.val.len(), 1);
    assert_eq!(report.train.len(), 5);

    let train = read_split_list(&report.files.train_list).unwrap();
    let val = read_split_list(&report.files.val_list).unwrap();
    assert_eq!(train, report.train);
    assert_eq!(val, report.val);
    let all: BTreeSet<_> = train.iter().chain(&val).collect();
    assert_eq!(all.len(), 6);
    for path in &all {
        assert!(path.is_absolute());
        assert!(path.exists());
    }
    let names: BTreeSet<_> = all
        .iter()
        .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
        .collect();
    for expected in ["r1.jpg", "r2.jpg", "n1.jpg", "n2.png"] {
        assert!(names.contains(expected), "{} not selected", expected);
    }

    let labels_dir = args.output_dir.join("labels");
    let r1 = fs::read_to_string(labels_dir.join("r1.txt")).unwrap();
    assert_eq!(
        r1,
        "0 0.200000 0.156250 0.200000 0.187500\n1 0.035000 0.062500 0.050000 0.100000\n"
    );
    assert_eq!(fs::read_to_string(labels_dir.join("n1.txt")).unwrap(), "");
    assert_eq!(fs::read_to_string(labels_dir.join("n2.txt")).unwrap(), "");

    let descriptor: DatasetDescriptor =
        serde_yaml::from_str(&fs::read_to_string(&report.files.descriptor).unwrap()).unwrap();
    assert_eq!(descriptor.names.get(&0).map(String::as_str), Some("ramp"));
    assert_eq!(descriptor.names.get(&1).map(String::as_str), Some("barrier"));
    assert_eq!(descriptor.train, report.files.train_list);
    assert_eq!(descriptor.val, report.files.val_list);
}

#[test]
fn rerun_keeps_copied_images_and_rewrites_lists() {
    let workspace = prepare_workspace(true);
    let args = &workspace.args;
    let first = process_dataset(args).unwrap();

    let copied = args.output_dir.join("images").join("r1.jpg");
    fs::write(&copied, "edited in place").unwrap();
    fs::write(&first.files.train_list, "stale\n").unwrap();

    let second = process_dataset(args).unwrap();
    assert_eq!(fs::read_to_string(&copied).unwrap(), "edited in place");
    assert_eq!(fs::read_dir(args.output_dir.join("images")).unwrap().count(), 6);
    assert_eq!(first.train, second.train);
    assert_eq!(
        read_split_list(&second.files.train_list).unwrap(),
        second.train
    );
}

#[test]
fn missing_primary_images_is_fatal() {
    let workspace = prepare_workspace(false);
    let result = process_dataset(&workspace.args);
    assert!(matches!(
        result,
        Err(DatasetError::NoPrimaryImages {
            secondary: 4,
            negative: 3,
            ..
        })
    ));
    assert!(!workspace.args.output_dir.join("data.yaml").exists());
}

#[test]
fn missing_image_dir_is_fatal() {
    let mut workspace = prepare_workspace(true);
    workspace.args.images_dir = workspace.args.images_dir.join("does-not-exist");
    assert!(matches!(
        process_dataset(&workspace.args),
        Err(DatasetError::MissingImageDir(_))
    ));
}

#[test]
fn rebalance_uses_existing_label_files() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let images_dir = root.join("images");
    let labels_dir = root.join("labels");
    fs::create_dir_all(&labels_dir).unwrap();

    let mut train = Vec::new();
    for (name, label) in [
        ("t_r1.jpg", Some("0 0.5 0.5 0.2 0.2\n1 0.2 0.2 0.1 0.1\n")),
        ("t_b1.jpg", Some("1 0.5 0.5 0.2 0.2\n")),
        ("t_b2.jpg", Some("1 0.5 0.5 0.2 0.2\n")),
        ("t_n1.jpg", Some("")),
        ("t_n2.jpg", None),
    ] {
        train.push(write_image(&images_dir, name));
        if let Some(label) = label {
            let stem = Path::new(name).file_stem().unwrap().to_str().unwrap();
            fs::write(labels_dir.join(format!("{}.txt", stem)), label).unwrap();
        }
    }
    let val = vec![
        write_image(&images_dir, "v_r1.jpg"),
        write_image(&images_dir, "v_n1.jpg"),
    ];
    fs::write(labels_dir.join("v_r1.txt"), "0 0.5 0.5 0.2 0.2\n").unwrap();

    let list = |paths: &[PathBuf]| {
        paths
            .iter()
            .map(|p| format!("{}\n", p.display()))
            .collect::<String>()
    };
    fs::write(root.join("train.txt"), list(&train)).unwrap();
    fs::write(root.join("val.txt"), format!("{}\n", list(&val))).unwrap();

    let args = RebalanceArgs {
        train_split: root.join("train.txt"),
        val_split: root.join("val.txt"),
        labels_dir: labels_dir.clone(),
        output_dir: root.join("balanced"),
        ratios: ratios(),
        seed: Some(11),
    };
    let report = rebalance_dataset(&args).unwrap();

    assert_eq!(report.train_stats.available.primary, 1);
    assert_eq!(report.train_stats.available.secondary, 2);
    assert_eq!(report.train_stats.available.negative, 2);
    assert_eq!(report.train_stats.kept.total(), 3);
    assert_eq!(report.val_stats.kept.total(), 2);
    assert_eq!(report.train.len(), 3);
    assert_eq!(report.val.len(), 2);

    let out_labels = args.output_dir.join("labels");
    assert_eq!(
        fs::read_to_string(out_labels.join("v_r1.txt")).unwrap(),
        "0 0.5 0.5 0.2 0.2\n"
    );
    assert_eq!(fs::read_to_string(out_labels.join("v_n1.txt")).unwrap(), "");
    assert!(args.output_dir.join("data_balanced.yaml").exists());
    assert_eq!(
        read_split_list(&args.output_dir.join("val_balanced.txt")).unwrap(),
        report.val
    );
}
