/// Binary min-heap ordered by an injected strict predicate.
///
/// `less(a, b)` must be a strict total order. The element for which `less`
/// holds against every other is at the root; ties sit in an unspecified but
/// deterministic internal order that callers must not rely on.
pub struct PriorityQueue<T, F>
where
    F: Fn(&T, &T) -> bool,
{
    heap: Vec<T>,
    less: F,
}

impl<T, F> PriorityQueue<T, F>
where
    F: Fn(&T, &T) -> bool,
{
    pub fn new(less: F) -> Self {
        Self {
            heap: Vec::new(),
            less,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Insert an element. O(log n).
    pub fn push(&mut self, element: T) {
        self.heap.push(element);
        self.sift_up(self.heap.len() - 1);
    }

    /// Remove and return the minimal element, or `None` when empty. O(log n).
    pub fn pop(&mut self) -> Option<T> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let result = self.heap.pop();
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        result
    }

    /// View the minimal element without removing it. O(1).
    pub fn peek(&self) -> Option<&T> {
        self.heap.first()
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if (self.less)(&self.heap[index], &self.heap[parent]) {
                self.heap.swap(index, parent);
                index = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        loop {
            let mut min_index = index;
            let left = 2 * index + 1;
            let right = 2 * index + 2;

            if left < self.heap.len() && (self.less)(&self.heap[left], &self.heap[min_index]) {
                min_index = left;
            }
            if right < self.heap.len() && (self.less)(&self.heap[right], &self.heap[min_index]) {
                min_index = right;
            }

            if min_index != index {
                self.heap.swap(index, min_index);
                index = min_index;
            } else {
                break;
            }
        }
    }
}
