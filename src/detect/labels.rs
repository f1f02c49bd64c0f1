use anyhow::{anyhow, Result};

/// 80-class COCO vocabulary in model output order.
pub const COCO_CLASS_NAMES: [&str; 80] = [
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

pub const DEFAULT_VEHICLE_LABELS: [&str; 4] = ["car", "truck", "motorcycle", "bus"];

/// Maps model class indices to names and decides which names count as vehicles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelTable {
    class_names: Vec<String>,
    vehicle_labels: Vec<String>,
}

impl LabelTable {
    pub fn new(class_names: Vec<String>, vehicle_labels: Vec<String>) -> Result<Self> {
        if class_names.is_empty() {
            return Err(anyhow!("label table must contain at least one class name"));
        }
        Ok(Self {
            class_names,
            vehicle_labels: vehicle_labels
                .into_iter()
                .map(|label| label.trim().to_lowercase())
                .filter(|label| !label.is_empty())
                .collect(),
        })
    }

    pub fn coco() -> Self {
        Self {
            class_names: COCO_CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
            vehicle_labels: DEFAULT_VEHICLE_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn label_for(&self, class_index: usize) -> Option<&str> {
        self.class_names.get(class_index).map(String::as_str)
    }

    pub fn is_vehicle(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.vehicle_labels.iter().any(|v| v == &label)
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn vehicle_labels(&self) -> &[String] {
        &self.vehicle_labels
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::coco()
    }
}
