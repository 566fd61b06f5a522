use approx::assert_relative_eq;
use serde_json::json;

use labelprep::coco::{
    calculate_polygon_area, CocoWriter, ImageIdAllocator, ImageIdScheme, InstanceGeometry,
};
use labelprep::coco_dataset::category_id;
use labelprep::config::{Args, ClassSource, Format};
use labelprep::conversion::ClassResolver;
use labelprep::geometry::Point;
use labelprep::Error;

fn square(x: f64, y: f64, size: f64) -> Vec<Point> {
    vec![
        Point::new(x, y),
        Point::new(x + size, y),
        Point::new(x + size, y + size),
        Point::new(x, y + size),
    ]
}

#[test]
fn test_calculate_polygon_area() {
    let triangle = [
        Point::new(0.0, 0.0),
        Point::new(4.0, 0.0),
        Point::new(0.0, 3.0),
    ];
    assert_relative_eq!(calculate_polygon_area(&triangle), 6.0);
    assert_relative_eq!(calculate_polygon_area(&square(5.0, 5.0, 10.0)), 100.0);
    assert_eq!(calculate_polygon_area(&triangle[..2]), 0.0);
}

#[test]
fn test_instance_measure_sums_parts() {
    let instance = InstanceGeometry {
        category_id: 1,
        parts: vec![square(0.0, 0.0, 10.0), square(20.0, 5.0, 5.0)],
    };
    let (bbox, area, segmentation) = instance.measure().unwrap();
    assert_eq!(bbox, [0.0, 0.0, 25.0, 10.0]);
    assert_relative_eq!(area, 125.0);
    assert_eq!(segmentation.len(), 2);
    assert_eq!(segmentation[0], vec![0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0]);
}

#[test]
fn test_instance_measure_drops_closing_vertex_and_flat_shapes() {
    let mut closed = square(0.0, 0.0, 2.0);
    closed.push(Point::new(0.0, 0.0));
    let (_, area, segmentation) = InstanceGeometry {
        category_id: 1,
        parts: vec![closed],
    }
    .measure()
    .unwrap();
    assert_relative_eq!(area, 4.0);
    assert_eq!(segmentation[0].len(), 8);

    let line = InstanceGeometry {
        category_id: 1,
        parts: vec![vec![Point::new(0.0, 0.0), Point::new(5.0, 5.0)]],
    };
    assert!(line.measure().is_none());
}

#[test]
fn test_sequential_image_ids() {
    let mut ids = ImageIdAllocator::new(ImageIdScheme::Sequential { start: 7 });
    assert_eq!(ids.next_id("a").unwrap(), 7);
    assert_eq!(ids.next_id("b").unwrap(), 8);
}

#[test]
fn test_grouped_image_ids() {
    let mut ids = ImageIdAllocator::new(ImageIdScheme::GroupedByName { offset: 2, len: 4 });
    assert_eq!(ids.next_id("ab0012_x").unwrap(), 12001);
    assert_eq!(ids.next_id("cd0012_y").unwrap(), 12002);
    assert_eq!(ids.next_id("ab0003").unwrap(), 3001);
    assert_eq!(ids.next_id("zz0012").unwrap(), 12003);

    assert!(matches!(ids.next_id("abc"), Err(Error::InvalidAnnotation(_))));
    assert!(matches!(ids.next_id("ab12x4"), Err(Error::InvalidAnnotation(_))));
}

#[test]
fn test_coco_writer_assigns_ids_across_splits() {
    let mut writer = CocoWriter::new(ImageIdScheme::Sequential { start: 1 });
    writer.add_category(1, "person");
    writer.add_category(1, "other");
    writer.add_category(2, "helmet");

    let instances = [
        InstanceGeometry {
            category_id: 1,
            parts: vec![square(0.0, 0.0, 10.0)],
        },
        InstanceGeometry {
            category_id: 2,
            parts: vec![vec![Point::new(1.0, 1.0), Point::new(2.0, 2.0)]],
        },
    ];
    let (image_id, dropped) = writer
        .add_image("img1.jpg".to_string(), 100, 50, &instances)
        .unwrap();
    assert_eq!(image_id, 1);
    assert_eq!(dropped, 1);

    let train = writer.finish_split();
    assert_eq!(train.images.len(), 1);
    assert_eq!(train.images[0].file_name, "img1.jpg");
    assert_eq!((train.images[0].width, train.images[0].height), (100, 50));
    assert_eq!(train.annotations.len(), 1);
    assert_eq!(train.annotations[0].id, 1);
    assert_eq!(train.annotations[0].bbox, [0.0, 0.0, 10.0, 10.0]);
    assert_eq!(train.annotations[0].iscrowd, 0);
    assert_eq!(train.categories.len(), 2);
    assert_eq!(train.categories[0].name, "person");

    writer
        .add_image("img2.jpg".to_string(), 100, 50, &instances[..1])
        .unwrap();
    let val = writer.finish_split();
    assert_eq!(val.images[0].id, 2);
    assert_eq!(val.annotations[0].id, 2);
    assert_eq!(val.annotations[0].image_id, 2);
}

#[test]
fn test_coco_file_json_layout() {
    let mut writer = CocoWriter::new(ImageIdScheme::Sequential { start: 1 });
    writer.add_category(1, "person");
    writer
        .add_image(
            "img.jpg".to_string(),
            20,
            10,
            &[InstanceGeometry {
                category_id: 1,
                parts: vec![square(1.0, 1.0, 2.0)],
            }],
        )
        .unwrap();
    let value = serde_json::to_value(writer.finish_split()).unwrap();
    assert_eq!(
        value,
        json!({
            "images": [{"file_name": "img.jpg", "height": 10, "width": 20, "id": 1}],
            "annotations": [{
                "id": 1,
                "image_id": 1,
                "category_id": 1,
                "bbox": [1.0, 1.0, 2.0, 2.0],
                "area": 4.0,
                "segmentation": [[1.0, 1.0, 3.0, 1.0, 3.0, 3.0, 1.0, 3.0]],
                "iscrowd": 0
            }],
            "categories": [{"id": 1, "name": "person"}]
        })
    );
}

#[test]
fn test_category_ids() {
    let args = |class_source: ClassSource| Args {
        json_dir: String::new(),
        val_size: 0.0,
        test_size: 0.0,
        output_format: Format::Bbox,
        class_source,
        group_id_offset: 1,
        seed: 0,
        prefix_folder: false,
        skip_labels: Vec::new(),
        label_list: vec!["person".to_string()],
    };
    let labels = ClassResolver::from_args(&args(ClassSource::Label), &[]);
    assert_eq!(category_id(&labels, 0), Some(1));

    let groups = ClassResolver::from_args(&args(ClassSource::GroupId), &[]);
    assert_eq!(category_id(&groups, 2), Some(3));
}
