/// COCO-80 class names in YOLOv8 output order.
pub const COCO_LABELS: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Map a model class id to its label.
pub fn coco_label(class_id: usize) -> Option<&'static str> {
    COCO_LABELS.get(class_id).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn animal_ids_match_yolov8_order() {
        assert_eq!(coco_label(15), Some("cat"));
        assert_eq!(coco_label(16), Some("dog"));
        assert_eq!(coco_label(17), Some("horse"));
        assert_eq!(coco_label(19), Some("cow"));
        assert_eq!(coco_label(23), Some("giraffe"));
        assert_eq!(coco_label(80), None);
    }
}
